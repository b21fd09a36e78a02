use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::host::{HostPage, Mount};

/// Base z-index for stacked surfaces; surface `n` of a stack sits at
/// `STACK_BASE_Z + n + 1` with the backdrop at `STACK_BASE_Z + n`.
pub const STACK_BASE_Z: u32 = 1060;
/// Node id of the single shared backdrop.
pub const BACKDROP_NODE: &str = "scrim-backdrop";
/// Body class suppressing page scroll while any surface is open.
pub const SCROLL_LOCK_CLASS: &str = "scrim-scroll-lock";
/// Reopen grace armed after a navigation-triggered force close.
pub const NAV_REOPEN_GRACE: Duration = Duration::from_millis(500);

#[derive(Default)]
struct StackState {
    order: Vec<String>,
    reopen_blocked_until: Option<Instant>,
}

/// Shared ordered registry of live open surfaces.
///
/// One registry backs every surface of an environment. Z-indexes and
/// backdrop presence are derived from its length at the moment of each
/// open or close, never cached per instance.
#[derive(Clone, Default)]
pub struct StackRegistry {
    inner: Arc<Mutex<StackState>>,
}

impl StackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a surface open. Returns the open count including it.
    pub fn push(&self, id: &str) -> usize {
        match self.inner.lock() {
            Ok(mut state) => {
                if !state.order.iter().any(|existing| existing == id) {
                    state.order.push(id.to_string());
                }
                state.order.len()
            }
            Err(_) => 0,
        }
    }

    /// Remove a surface from any position. Returns the remaining count.
    pub fn remove(&self, id: &str) -> usize {
        match self.inner.lock() {
            Ok(mut state) => {
                state.order.retain(|existing| existing != id);
                state.order.len()
            }
            Err(_) => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|state| state.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .map(|state| state.order.iter().any(|existing| existing == id))
            .unwrap_or(false)
    }

    /// Most recently opened surface still on the stack.
    pub fn topmost(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.order.last().cloned())
    }

    pub fn is_topmost(&self, id: &str) -> bool {
        self.topmost().as_deref() == Some(id)
    }

    pub fn order(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|state| state.order.clone())
            .unwrap_or_default()
    }

    /// Bring the backdrop node in line with the live open count: absent
    /// with no surfaces, base stylesheet level under a single surface,
    /// raised to sit directly beneath the topmost of a deeper stack.
    pub fn sync_backdrop(&self, page: &dyn HostPage) {
        match self.len() {
            0 => page.remove_node(BACKDROP_NODE),
            n => {
                if !page.has_node(BACKDROP_NODE) {
                    page.attach_node(BACKDROP_NODE, Mount::Body);
                    page.add_class(BACKDROP_NODE, "scrim-backdrop");
                }
                if n == 1 {
                    page.set_style(BACKDROP_NODE, "z-index", None);
                } else {
                    let z = STACK_BASE_Z + n as u32;
                    page.set_style(BACKDROP_NODE, "z-index", Some(&z.to_string()));
                }
            }
        }
    }

    /// Inline z-index a surface settling as the `n`-th open member must
    /// carry; the first member stays at its stylesheet level.
    pub fn surface_z(n: usize) -> Option<u32> {
        if n > 1 {
            Some(STACK_BASE_Z + n as u32 + 1)
        } else {
            None
        }
    }

    /// Arm the post-navigation grace window.
    pub fn block_reopen_until(&self, deadline: Instant) {
        if let Ok(mut state) = self.inner.lock() {
            state.reopen_blocked_until = Some(deadline);
        }
    }

    /// Deadline a new open must wait for, if the grace window is still
    /// running at `now`.
    pub fn reopen_deadline(&self, now: Instant) -> Option<Instant> {
        let mut guard = self.inner.lock().ok()?;
        match guard.reopen_blocked_until {
            Some(deadline) if now < deadline => Some(deadline),
            Some(_) => {
                guard.reopen_blocked_until = None;
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryPage;

    #[test]
    fn push_and_remove_track_order() {
        let stack = StackRegistry::new();
        assert_eq!(stack.push("a"), 1);
        assert_eq!(stack.push("b"), 2);
        assert_eq!(stack.push("c"), 3);
        assert_eq!(stack.topmost().as_deref(), Some("c"));

        // Removal from the middle keeps relative order.
        assert_eq!(stack.remove("b"), 2);
        assert_eq!(stack.order(), vec!["a", "c"]);
        assert!(stack.is_topmost("c"));
        assert!(!stack.is_topmost("a"));
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let stack = StackRegistry::new();
        stack.push("a");
        assert_eq!(stack.push("a"), 1);
    }

    #[test]
    fn backdrop_follows_stack_depth() {
        let stack = StackRegistry::new();
        let page = MemoryPage::new();

        stack.push("a");
        stack.sync_backdrop(&page);
        assert!(page.has_node(BACKDROP_NODE));
        assert!(page.style(BACKDROP_NODE, "z-index").is_none());

        stack.push("b");
        stack.sync_backdrop(&page);
        assert_eq!(
            page.style(BACKDROP_NODE, "z-index").as_deref(),
            Some("1062")
        );

        stack.remove("b");
        stack.sync_backdrop(&page);
        assert!(page.style(BACKDROP_NODE, "z-index").is_none());

        stack.remove("a");
        stack.sync_backdrop(&page);
        assert!(!page.has_node(BACKDROP_NODE));
    }

    #[test]
    fn surface_z_leaves_first_member_alone() {
        assert_eq!(StackRegistry::surface_z(1), None);
        assert_eq!(StackRegistry::surface_z(2), Some(1063));
        assert_eq!(StackRegistry::surface_z(3), Some(1064));
    }

    #[test]
    fn reopen_grace_expires() {
        let stack = StackRegistry::new();
        let now = Instant::now();
        stack.block_reopen_until(now + Duration::from_millis(100));

        assert!(stack.reopen_deadline(now).is_some());
        assert!(
            stack
                .reopen_deadline(now + Duration::from_millis(150))
                .is_none()
        );
        // The expired window is cleared, not just bypassed.
        assert!(stack.reopen_deadline(now).is_none());
    }
}
