//! Overlay surface engine: renders, stacks, and tears down transient
//! dialogs and edge-anchored panels on top of a host page.
//!
//! The crate is split along the lifecycle: [`engine`] holds the shared
//! open/close state machine and the stack registry, [`surface`] the two
//! concrete surface strategies, [`manager`] the imperative façade, and
//! [`handle`] the caller-facing result/update/guard object. The host
//! document is reached only through the [`host`] collaborator boundary,
//! so the whole engine runs headless with a detached accessor.

pub mod config;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod handle;
pub mod host;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod surface;
pub mod timer;

pub use config::{
    BackdropMode, BodyContent, ButtonLabels, DEFAULT_CLOSE_EVENT, DEFAULT_OVERLAY_WIDTH,
    DialogConfig, ModalSize, OverlayDirection, SurfaceVariant,
};
pub use engine::{
    BACKDROP_NODE, DialogAudit, DialogAuditEvent, DialogAuditStage, DialogCore, DialogEnv,
    DialogPhase, DismissTrigger, NAV_REOPEN_GRACE, NullDialogAudit, OPEN_MARKER_CLASS,
    SCROLL_LOCK_CLASS, SETTLE_DELAY, STACK_BASE_Z, StackRegistry,
};
pub use error::{Result, ScrimError};
pub use fragment::{EventHandler, Fragment, FragmentContext, FragmentEmitter, FragmentFactory};
pub use handle::{
    CloseGuard, CommandQueue, DataPayload, DialogHandle, GuardOutcome, GuardResolver, GuardSlot,
    GuardTicket, HandleCommand, ResultSlot, confirm_before_close, guard_channel,
};
pub use host::{HostPage, MemoryPage, Mount, NodeSnapshot, SharedPage, WindowAccessor, same_route};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use manager::{
    ClosedNotice, DialogManager, METRICS_EMIT_INTERVAL, TEARDOWN_DELAY, advance,
};
pub use metrics::{EngineMetrics, MetricSnapshot};
pub use surface::{
    ChromeContext, ModalSurface, OVERLAY_ENTER_DELAY, OverlaySurface, SurfaceKind,
};
pub use timer::{FrameQueue, TimerId, TimerQueue};
