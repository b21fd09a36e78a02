//! Injected-fragment contract.
//!
//! The engine creates body content at runtime through a narrow factory
//! boundary: a [`Fragment`] can be created detached, mounted into a
//! container node, fed data fields, asked to render synchronously, and
//! destroyed. It never learns which component model is behind the trait.
//! Outbound events flow through a [`FragmentEmitter`] whose wiring is
//! torn down with the fragment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::Result;
use crate::handle::DialogHandle;
use crate::host::{HostPage, WindowAccessor};

/// Factory producing a fresh fragment instance per injection.
pub type FragmentFactory = Arc<dyn Fn() -> Box<dyn Fragment> + Send + Sync>;

/// Handler invoked when a fragment raises a wired event.
pub type EventHandler = Box<dyn FnMut(Value) + Send>;

/// Injection context handed to a fragment at mount time.
#[derive(Clone)]
pub struct FragmentContext {
    window: WindowAccessor,
    container_id: String,
    emitter: FragmentEmitter,
}

impl FragmentContext {
    pub fn new(window: WindowAccessor, container_id: impl Into<String>, emitter: FragmentEmitter) -> Self {
        Self {
            window,
            container_id: container_id.into(),
            emitter,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn emitter(&self) -> &FragmentEmitter {
        &self.emitter
    }

    /// Write rendered output into the fragment's container node.
    /// Degrades to a no-op without a window.
    pub fn set_container_content(&self, content: &str) {
        if let Some(page) = self.window.document() {
            page.set_content(&self.container_id, content);
        }
    }
}

/// Runtime-injected body content.
///
/// Implementations own their rendering; the engine only drives the
/// lifecycle. `set_field` returns false for undeclared keys so the
/// injection path can skip them silently.
pub trait Fragment: Send {
    fn type_name(&self) -> &'static str;

    fn mount(&mut self, cx: &FragmentContext) -> Result<()>;

    /// Copy one data key onto a public field. Returns false when the
    /// fragment does not declare the key.
    fn set_field(&mut self, key: &str, value: &Value) -> bool;

    /// Whether the fragment declares a slot for the owning dialog handle.
    fn wants_handle(&self) -> bool {
        false
    }

    fn accept_handle(&mut self, _handle: DialogHandle) {}

    /// Template the fragment supplies for the surface header, if any.
    fn header_template(&self) -> Option<String> {
        None
    }

    /// Template the fragment supplies for the surface footer, if any.
    fn footer_template(&self) -> Option<String> {
        None
    }

    /// Outbound event names this fragment can raise.
    fn event_names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Force a synchronous render pass into the container.
    fn render(&mut self, cx: &FragmentContext) -> Result<()>;

    fn unmount(&mut self, cx: &FragmentContext);
}

/// Per-instance event channel between a fragment and its caller.
///
/// Handlers are wired by the engine for the event names the fragment
/// actually exposes and dropped wholesale when the fragment is
/// destroyed. Emitting an event with no wiring is a no-op.
#[derive(Clone, Default)]
pub struct FragmentEmitter {
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl FragmentEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wire(&self, event: impl Into<String>, handler: EventHandler) {
        if let Ok(mut guard) = self.handlers.lock() {
            guard.entry(event.into()).or_default().push(handler);
        }
    }

    pub fn is_wired(&self, event: &str) -> bool {
        self.handlers
            .lock()
            .map(|guard| guard.contains_key(event))
            .unwrap_or(false)
    }

    /// Raise an event toward the wired handlers.
    ///
    /// Handlers run outside the internal lock; a handler emitting the
    /// same event recursively finds no wiring and no-ops instead of
    /// deadlocking.
    pub fn emit(&self, event: &str, payload: Value) {
        let mut taken = match self.handlers.lock() {
            Ok(mut guard) => match guard.remove(event) {
                Some(handlers) => handlers,
                None => return,
            },
            Err(_) => return,
        };

        for handler in taken.iter_mut() {
            handler(payload.clone());
        }

        if let Ok(mut guard) = self.handlers.lock() {
            guard.entry(event.to_string()).or_default().extend(taken);
        }
    }

    /// Drop every wired handler.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.handlers.lock() {
            guard.clear();
        }
    }
}
