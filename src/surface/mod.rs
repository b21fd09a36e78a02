//! Concrete surface strategies composed into the lifecycle engine.
//!
//! The engine owns the shared state machine; a [`SurfaceKind`] only
//! contributes what differs between a centered modal and an
//! edge-anchored overlay panel: CSS classes, the open/close hooks, and
//! (for overlays) a timed enter-transition flag.

use std::time::Duration;

use crate::config::{ModalSize, OverlayDirection};
use crate::host::{HostPage, WindowAccessor};

/// Delay after which an overlay reports its enter transition finished.
pub const OVERLAY_ENTER_DELAY: Duration = Duration::from_millis(150);

/// What a strategy hook is allowed to touch.
pub struct ChromeContext<'a> {
    pub window: &'a WindowAccessor,
    /// Root node id of the surface, also used as the per-instance style
    /// rule key.
    pub surface_node: &'a str,
}

/// Variant behavior plugged into the lifecycle engine.
pub trait SurfaceKind: Send {
    fn kind_name(&self) -> &'static str;

    /// Variant CSS classes applied to the root node.
    fn classes(&self) -> Vec<String>;

    /// Runs after the surface settles into the open state. Returning a
    /// duration asks the engine to call [`SurfaceKind::on_delay_elapsed`]
    /// that much later.
    fn on_open(&mut self, cx: &ChromeContext<'_>) -> Option<Duration>;

    /// Runs at the start of teardown, before the node detaches.
    fn on_close(&mut self, cx: &ChromeContext<'_>);

    fn on_delay_elapsed(&mut self) {}

    /// Whether enter-transition styling may be applied. Modals have no
    /// gated transition and always report true.
    fn transition_done(&self) -> bool {
        true
    }
}

/// Centered dialog; contributes only a sizing class.
pub struct ModalSurface {
    size: ModalSize,
}

impl ModalSurface {
    pub fn new(size: ModalSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> ModalSize {
        self.size
    }
}

impl SurfaceKind for ModalSurface {
    fn kind_name(&self) -> &'static str {
        "modal"
    }

    fn classes(&self) -> Vec<String> {
        vec!["scrim-modal".to_string(), self.size.css_class().to_string()]
    }

    fn on_open(&mut self, _cx: &ChromeContext<'_>) -> Option<Duration> {
        None
    }

    fn on_close(&mut self, _cx: &ChromeContext<'_>) {}
}

/// Edge-anchored panel with a dynamically injected width rule.
pub struct OverlaySurface {
    direction: OverlayDirection,
    width: String,
    height: Option<String>,
    finished_opening: bool,
}

impl OverlaySurface {
    pub fn new(direction: OverlayDirection, width: impl Into<String>, height: Option<String>) -> Self {
        Self {
            direction,
            width: width.into(),
            height,
            finished_opening: false,
        }
    }

    pub fn direction(&self) -> OverlayDirection {
        self.direction
    }

    fn style_rule(&self, key: &str) -> String {
        match &self.height {
            Some(height) => format!(".{key} {{ width: {}; height: {height}; }}", self.width),
            None => format!(".{key} {{ width: {}; }}", self.width),
        }
    }
}

impl SurfaceKind for OverlaySurface {
    fn kind_name(&self) -> &'static str {
        "overlay"
    }

    fn classes(&self) -> Vec<String> {
        vec![
            "scrim-overlay".to_string(),
            self.direction.css_class().to_string(),
        ]
    }

    fn on_open(&mut self, cx: &ChromeContext<'_>) -> Option<Duration> {
        if let Some(page) = cx.window.document() {
            page.insert_style_rule(cx.surface_node, &self.style_rule(cx.surface_node));
        }
        Some(OVERLAY_ENTER_DELAY)
    }

    fn on_close(&mut self, cx: &ChromeContext<'_>) {
        if let Some(page) = cx.window.document() {
            page.remove_style_rule(cx.surface_node);
        }
        self.finished_opening = false;
    }

    fn on_delay_elapsed(&mut self) {
        self.finished_opening = true;
    }

    fn transition_done(&self) -> bool {
        self.finished_opening
    }
}
