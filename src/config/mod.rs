//! Per-open dialog configuration.
//!
//! A `DialogConfig` is assembled with builder calls, normalized once by
//! the opener, and treated as immutable for the lifetime of that open.

use serde_json::Value;

use crate::fragment::{EventHandler, FragmentFactory};
use crate::handle::DataPayload;

/// Default panel width applied when an overlay config leaves it blank.
pub const DEFAULT_OVERLAY_WIDTH: &str = "475px";
/// Event name the manager wires to its own close unless overridden.
pub const DEFAULT_CLOSE_EVENT: &str = "close";

/// How the shared backdrop reacts to clicks outside the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackdropMode {
    /// Outside clicks are ignored.
    #[default]
    Static,
    /// Outside clicks close the surface.
    Dismissible,
}

/// Modal sizing classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalSize {
    Sm,
    #[default]
    Md,
    Lg,
    Xl,
    Fullscreen,
}

impl ModalSize {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Sm => "scrim-modal-sm",
            Self::Md => "scrim-modal-md",
            Self::Lg => "scrim-modal-lg",
            Self::Xl => "scrim-modal-xl",
            Self::Fullscreen => "scrim-modal-fullscreen",
        }
    }
}

/// Edge a panel is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayDirection {
    Left,
    #[default]
    Right,
    Top,
    Bottom,
}

impl OverlayDirection {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Left => "scrim-overlay-left",
            Self::Right => "scrim-overlay-right",
            Self::Top => "scrim-overlay-top",
            Self::Bottom => "scrim-overlay-bottom",
        }
    }
}

/// Which concrete surface an open produces.
#[derive(Clone)]
pub enum SurfaceVariant {
    Modal {
        size: ModalSize,
    },
    Overlay {
        direction: OverlayDirection,
        width: String,
        height: Option<String>,
    },
}

impl Default for SurfaceVariant {
    fn default() -> Self {
        Self::Modal {
            size: ModalSize::default(),
        }
    }
}

/// Body slot content: a static template or a runtime-injected fragment.
#[derive(Clone)]
pub enum BodyContent {
    Template(String),
    Fragment(FragmentFactory),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonLabels {
    pub confirm: String,
    pub dismiss: String,
}

impl Default for ButtonLabels {
    fn default() -> Self {
        Self {
            confirm: "OK".to_string(),
            dismiss: "Cancel".to_string(),
        }
    }
}

/// Immutable-per-open dialog options.
///
/// Header and footer resolve by priority: a template the injected
/// fragment declares beats `header`/`footer` here, which beat the
/// `static_*` templates composed at the call site. Exactly one source
/// wins.
pub struct DialogConfig {
    pub variant: SurfaceVariant,
    pub backdrop: BackdropMode,
    pub show_close_button: bool,
    pub show_header: bool,
    pub show_footer: bool,
    pub custom_class: Option<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub static_header: Option<String>,
    pub static_footer: Option<String>,
    pub body: Option<BodyContent>,
    pub data: DataPayload,
    pub event_handlers: Vec<(String, EventHandler)>,
    pub labels: ButtonLabels,
    pub close_event: String,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            variant: SurfaceVariant::default(),
            backdrop: BackdropMode::default(),
            show_close_button: true,
            show_header: true,
            show_footer: true,
            custom_class: None,
            header: None,
            footer: None,
            static_header: None,
            static_footer: None,
            body: None,
            data: DataPayload::new(),
            event_handlers: Vec::new(),
            labels: ButtonLabels::default(),
            close_event: DEFAULT_CLOSE_EVENT.to_string(),
        }
    }
}

impl DialogConfig {
    pub fn modal(size: ModalSize) -> Self {
        Self {
            variant: SurfaceVariant::Modal { size },
            ..Self::default()
        }
    }

    pub fn overlay(direction: OverlayDirection, width: impl Into<String>) -> Self {
        Self {
            variant: SurfaceVariant::Overlay {
                direction,
                width: width.into(),
                height: None,
            },
            ..Self::default()
        }
    }

    /// Alert preset: title, message body, confirm button only.
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            variant: SurfaceVariant::Modal {
                size: ModalSize::Sm,
            },
            header: Some(title.into()),
            body: Some(BodyContent::Template(message.into())),
            show_close_button: false,
            ..Self::default()
        }
    }

    /// Confirm preset: title, message body, confirm + dismiss buttons,
    /// dismissible backdrop.
    pub fn confirm(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            variant: SurfaceVariant::Modal {
                size: ModalSize::Sm,
            },
            backdrop: BackdropMode::Dismissible,
            header: Some(title.into()),
            body: Some(BodyContent::Template(message.into())),
            ..Self::default()
        }
    }

    pub fn backdrop(mut self, mode: BackdropMode) -> Self {
        self.backdrop = mode;
        self
    }

    pub fn show_close_button(mut self, show: bool) -> Self {
        self.show_close_button = show;
        self
    }

    pub fn show_header(mut self, show: bool) -> Self {
        self.show_header = show;
        self
    }

    pub fn show_footer(mut self, show: bool) -> Self {
        self.show_footer = show;
        self
    }

    pub fn custom_class(mut self, class: impl Into<String>) -> Self {
        self.custom_class = Some(class.into());
        self
    }

    pub fn header(mut self, template: impl Into<String>) -> Self {
        self.header = Some(template.into());
        self
    }

    pub fn footer(mut self, template: impl Into<String>) -> Self {
        self.footer = Some(template.into());
        self
    }

    pub fn static_header(mut self, template: impl Into<String>) -> Self {
        self.static_header = Some(template.into());
        self
    }

    pub fn static_footer(mut self, template: impl Into<String>) -> Self {
        self.static_footer = Some(template.into());
        self
    }

    pub fn body_template(mut self, template: impl Into<String>) -> Self {
        self.body = Some(BodyContent::Template(template.into()));
        self
    }

    pub fn body_fragment(mut self, factory: FragmentFactory) -> Self {
        self.body = Some(BodyContent::Fragment(factory));
        self
    }

    pub fn data_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn data(mut self, payload: DataPayload) -> Self {
        self.data = payload;
        self
    }

    pub fn on_event(mut self, event: impl Into<String>, handler: EventHandler) -> Self {
        self.event_handlers.push((event.into(), handler));
        self
    }

    pub fn labels(mut self, confirm: impl Into<String>, dismiss: impl Into<String>) -> Self {
        self.labels = ButtonLabels {
            confirm: confirm.into(),
            dismiss: dismiss.into(),
        };
        self
    }

    pub fn close_event(mut self, event: impl Into<String>) -> Self {
        self.close_event = event.into();
        self
    }

    /// Fill blanks with the documented defaults. Called once per open.
    pub fn normalized(mut self) -> Self {
        if let SurfaceVariant::Overlay { width, .. } = &mut self.variant {
            if width.trim().is_empty() {
                *width = DEFAULT_OVERLAY_WIDTH.to_string();
            }
        }
        if self.labels.confirm.is_empty() {
            self.labels.confirm = ButtonLabels::default().confirm;
        }
        if self.labels.dismiss.is_empty() {
            self.labels.dismiss = ButtonLabels::default().dismiss;
        }
        if self.close_event.is_empty() {
            self.close_event = DEFAULT_CLOSE_EVENT.to_string();
        }
        self
    }

    pub fn is_fragment_body(&self) -> bool {
        matches!(self.body, Some(BodyContent::Fragment(_)))
    }
}
