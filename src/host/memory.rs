use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use blake3::Hash;

use super::core::{HostPage, Mount};

#[derive(Debug, Clone)]
struct NodeState {
    mount: Mount,
    classes: BTreeSet<String>,
    content: String,
    styles: BTreeMap<String, String>,
    hash: Option<Hash>,
}

impl NodeState {
    fn new(mount: Mount) -> Self {
        Self {
            mount,
            classes: BTreeSet::new(),
            content: String::new(),
            styles: BTreeMap::new(),
            hash: None,
        }
    }

    /// Returns true when the content actually changed.
    fn update_content(&mut self, content: &str) -> bool {
        let new_hash = blake3::hash(content.as_bytes());
        if self.hash.map(|h| h != new_hash).unwrap_or(true) {
            self.content = content.to_string();
            self.hash = Some(new_hash);
            return true;
        }
        false
    }
}

/// Read-only view of a node, handed out to assertions and diagnostics.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub mount: Mount,
    pub classes: Vec<String>,
    pub content: String,
    pub styles: BTreeMap<String, String>,
}

/// Remove a node and, transitively, every node mounted within it.
fn remove_subtree(inner: &mut PageInner, id: &str) {
    inner.nodes.remove(id);
    inner.body_order.retain(|existing| existing != id);
    inner.dirty.remove(id);

    let children: Vec<String> = inner
        .nodes
        .iter()
        .filter_map(|(child, state)| match &state.mount {
            Mount::Within(parent) if parent == id => Some(child.clone()),
            _ => None,
        })
        .collect();
    for child in children {
        remove_subtree(inner, &child);
    }
}

#[derive(Default)]
struct PageInner {
    nodes: HashMap<String, NodeState>,
    body_order: Vec<String>,
    body_classes: BTreeSet<String>,
    style_rules: BTreeMap<String, String>,
    scroll: f64,
    location: String,
    dirty: HashSet<String>,
}

/// In-memory document model.
///
/// Backs tests and headless hosts; content writes are hashed so a
/// repeated identical write does not mark the node dirty.
#[derive(Default)]
pub struct MemoryPage {
    inner: Mutex<PageInner>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(location: impl Into<String>) -> Self {
        let page = Self::new();
        page.set_location(location);
        page
    }

    pub fn set_location(&self, location: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.location = location.into();
        }
    }

    /// Simulate user scrolling without going through `scroll_to`.
    pub fn drift_scroll(&self, offset: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.scroll = offset;
        }
    }

    pub fn node(&self, id: &str) -> Option<NodeSnapshot> {
        let inner = self.inner.lock().ok()?;
        inner.nodes.get(id).map(|state| NodeSnapshot {
            mount: state.mount.clone(),
            classes: state.classes.iter().cloned().collect(),
            content: state.content.clone(),
            styles: state.styles.clone(),
        })
    }

    /// Body children in attachment order.
    pub fn body_nodes(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.body_order.clone())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.nodes.len()).unwrap_or(0)
    }

    /// Drain the ids whose content changed since the last call.
    pub fn take_dirty(&self) -> Vec<String> {
        match self.inner.lock() {
            Ok(mut inner) => {
                let mut ids: Vec<String> = inner.dirty.drain().collect();
                ids.sort();
                ids
            }
            Err(_) => Vec::new(),
        }
    }
}

impl HostPage for MemoryPage {
    fn attach_node(&self, id: &str, mount: Mount) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.nodes.contains_key(id) {
                return;
            }
            if matches!(mount, Mount::Body) {
                inner.body_order.push(id.to_string());
            }
            inner.nodes.insert(id.to_string(), NodeState::new(mount));
            inner.dirty.insert(id.to_string());
        }
    }

    fn remove_node(&self, id: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            remove_subtree(&mut inner, id);
        }
    }

    fn has_node(&self, id: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.nodes.contains_key(id))
            .unwrap_or(false)
    }

    fn set_content(&self, id: &str, content: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            let inner = &mut *guard;
            if let Some(state) = inner.nodes.get_mut(id) {
                if state.update_content(content) {
                    inner.dirty.insert(id.to_string());
                }
            }
        }
    }

    fn content(&self, id: &str) -> Option<String> {
        let inner = self.inner.lock().ok()?;
        inner.nodes.get(id).map(|state| state.content.clone())
    }

    fn add_class(&self, id: &str, class: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(state) = inner.nodes.get_mut(id) {
                state.classes.insert(class.to_string());
            }
        }
    }

    fn remove_class(&self, id: &str, class: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(state) = inner.nodes.get_mut(id) {
                state.classes.remove(class);
            }
        }
    }

    fn has_class(&self, id: &str, class: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .nodes
                    .get(id)
                    .map(|state| state.classes.contains(class))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn set_style(&self, id: &str, property: &str, value: Option<&str>) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(state) = inner.nodes.get_mut(id) {
                match value {
                    Some(value) => {
                        state.styles.insert(property.to_string(), value.to_string());
                    }
                    None => {
                        state.styles.remove(property);
                    }
                }
            }
        }
    }

    fn style(&self, id: &str, property: &str) -> Option<String> {
        let inner = self.inner.lock().ok()?;
        inner
            .nodes
            .get(id)
            .and_then(|state| state.styles.get(property).cloned())
    }

    fn add_body_class(&self, class: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.body_classes.insert(class.to_string());
        }
    }

    fn remove_body_class(&self, class: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.body_classes.remove(class);
        }
    }

    fn has_body_class(&self, class: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.body_classes.contains(class))
            .unwrap_or(false)
    }

    fn insert_style_rule(&self, key: &str, rule: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.style_rules.insert(key.to_string(), rule.to_string());
        }
    }

    fn remove_style_rule(&self, key: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.style_rules.remove(key);
        }
    }

    fn has_style_rule(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.style_rules.contains_key(key))
            .unwrap_or(false)
    }

    fn scroll_offset(&self) -> f64 {
        self.inner.lock().map(|inner| inner.scroll).unwrap_or(0.0)
    }

    fn scroll_to(&self, offset: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.scroll = offset;
        }
    }

    fn location(&self) -> String {
        self.inner
            .lock()
            .map(|inner| inner.location.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_remove_track_body_order() {
        let page = MemoryPage::new();
        page.attach_node("a", Mount::Body);
        page.attach_node("b", Mount::Body);
        page.attach_node("style", Mount::Head);

        assert_eq!(page.body_nodes(), vec!["a", "b"]);
        assert!(page.has_node("style"));

        page.remove_node("a");
        assert_eq!(page.body_nodes(), vec!["b"]);
        assert!(!page.has_node("a"));
    }

    #[test]
    fn removing_a_node_takes_its_subtree() {
        let page = MemoryPage::new();
        page.attach_node("root", Mount::Body);
        page.attach_node("header", Mount::Within("root".to_string()));
        page.attach_node("close", Mount::Within("header".to_string()));
        page.attach_node("other", Mount::Body);

        page.remove_node("root");
        assert!(!page.has_node("root"));
        assert!(!page.has_node("header"));
        assert!(!page.has_node("close"));
        assert!(page.has_node("other"));
    }

    #[test]
    fn identical_content_write_is_not_dirty() {
        let page = MemoryPage::new();
        page.attach_node("zone", Mount::Body);
        page.take_dirty();

        page.set_content("zone", "hello");
        assert_eq!(page.take_dirty(), vec!["zone"]);

        page.set_content("zone", "hello");
        assert!(page.take_dirty().is_empty());
    }

    #[test]
    fn styles_and_classes_round_trip() {
        let page = MemoryPage::new();
        page.attach_node("panel", Mount::Body);
        page.add_class("panel", "open");
        page.set_style("panel", "z-index", Some("1063"));

        assert!(page.has_class("panel", "open"));
        assert_eq!(page.style("panel", "z-index").as_deref(), Some("1063"));

        page.set_style("panel", "z-index", None);
        assert!(page.style("panel", "z-index").is_none());
    }

    #[test]
    fn body_classes_and_scroll_state() {
        let page = MemoryPage::new();
        page.add_body_class("locked");
        assert!(page.has_body_class("locked"));
        page.remove_body_class("locked");
        assert!(!page.has_body_class("locked"));

        page.scroll_to(120.0);
        assert_eq!(page.scroll_offset(), 120.0);
    }
}
