use std::sync::Arc;

/// Attachment point for a page node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    Body,
    Head,
    /// Child of an existing node; removed along with its parent.
    Within(String),
}

/// Contract the engine needs from the hosting document.
///
/// Every operation is infallible by design: document mutation either
/// happens or degrades to a no-op, and the lifecycle algorithms recover
/// locally (see the error-handling policy in the crate docs). Methods
/// take `&self`; implementations use interior mutability so one page can
/// be shared by every surface of an environment.
pub trait HostPage: Send + Sync {
    fn attach_node(&self, id: &str, mount: Mount);
    fn remove_node(&self, id: &str);
    fn has_node(&self, id: &str) -> bool;

    fn set_content(&self, id: &str, content: &str);
    fn content(&self, id: &str) -> Option<String>;

    fn add_class(&self, id: &str, class: &str);
    fn remove_class(&self, id: &str, class: &str);
    fn has_class(&self, id: &str, class: &str) -> bool;

    /// Set (`Some`) or clear (`None`) an inline style property.
    fn set_style(&self, id: &str, property: &str, value: Option<&str>);
    fn style(&self, id: &str, property: &str) -> Option<String>;

    fn add_body_class(&self, class: &str);
    fn remove_body_class(&self, class: &str);
    fn has_body_class(&self, class: &str) -> bool;

    /// Insert a scoped stylesheet rule into the document head, keyed so
    /// it can be removed later.
    fn insert_style_rule(&self, key: &str, rule: &str);
    fn remove_style_rule(&self, key: &str);
    fn has_style_rule(&self, key: &str) -> bool;

    fn scroll_offset(&self) -> f64;
    fn scroll_to(&self, offset: f64);

    /// Current location as `origin + path [+ query/fragment]`.
    fn location(&self) -> String;
}

pub type SharedPage = Arc<dyn HostPage>;

/// Indirection over the global window object.
///
/// A detached accessor stands in for the missing window during a
/// non-interactive render pass; callers get `None` handles and are
/// expected to no-op rather than fail.
#[derive(Clone, Default)]
pub struct WindowAccessor {
    page: Option<SharedPage>,
}

impl WindowAccessor {
    pub fn attached(page: SharedPage) -> Self {
        Self { page: Some(page) }
    }

    /// Accessor with no window behind it.
    pub fn detached() -> Self {
        Self { page: None }
    }

    pub fn document(&self) -> Option<&SharedPage> {
        self.page.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.page.is_some()
    }

    pub fn location(&self) -> Option<String> {
        self.page.as_ref().map(|page| page.location())
    }
}

/// Compare two locations by origin and path, ignoring query and
/// fragment. A navigation to the same origin+path (for example a query
/// parameter change) must not tear dialogs down.
pub fn same_route(a: &str, b: &str) -> bool {
    route_key(a) == route_key(b)
}

fn route_key(location: &str) -> &str {
    let end = location
        .find(['?', '#'])
        .unwrap_or(location.len());
    &location[..end]
}
