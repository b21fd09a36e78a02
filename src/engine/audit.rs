//! Lifecycle audit hooks.
//!
//! Lightweight instrumentation so hosts can observe the major lifecycle
//! transitions without contorting the engine: each checkpoint carries a
//! stage identifier plus structured metadata for logging, buffering, or
//! visualization downstream.

use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints emitted by the engine and manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAuditStage {
    /// A surface core was constructed.
    SurfaceConstructed,
    /// An open was requested (possibly deferred by the reopen grace).
    OpenRequested,
    /// The surface settled into the open state.
    SurfaceOpened,
    /// A dismiss trigger fired (Escape, backdrop, close button).
    DismissRequested,
    /// A navigation mismatch forced the surface closed.
    NavigationForcedClose,
    /// The close algorithm completed.
    SurfaceClosed,
    /// Body content was injected.
    FragmentInjected,
    /// Injected content was destroyed.
    FragmentDestroyed,
    /// The manager finished delayed teardown of an instance.
    TeardownCompleted,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct DialogAuditEvent {
    pub timestamp: SystemTime,
    pub stage: DialogAuditStage,
    pub details: Vec<(String, Value)>,
}

impl DialogAuditEvent {
    pub fn new(stage: DialogAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.push((key.into(), value));
        self
    }
}

/// Trait implemented by any audit sink.
pub trait DialogAudit: Send + Sync {
    fn record(&self, event: DialogAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullDialogAudit;

impl DialogAudit for NullDialogAudit {
    fn record(&self, _event: DialogAuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingAudit {
        stages: Mutex<Vec<DialogAuditStage>>,
    }

    impl DialogAudit for RecordingAudit {
        fn record(&self, event: DialogAuditEvent) {
            if let Ok(mut stages) = self.stages.lock() {
                stages.push(event.stage);
            }
        }
    }

    #[test]
    fn events_accumulate_details() {
        let event = DialogAuditEvent::new(DialogAuditStage::SurfaceOpened)
            .detail("surface", json!("scrim-surface-1"))
            .detail("stack_depth", json!(2));
        assert_eq!(event.stage, DialogAuditStage::SurfaceOpened);
        assert_eq!(event.details.len(), 2);
    }

    #[test]
    fn sinks_receive_records() {
        let audit = Arc::new(RecordingAudit::default());
        audit.record(DialogAuditEvent::new(DialogAuditStage::OpenRequested));
        audit.record(DialogAuditEvent::new(DialogAuditStage::SurfaceClosed));
        assert_eq!(
            *audit.stages.lock().unwrap(),
            vec![
                DialogAuditStage::OpenRequested,
                DialogAuditStage::SurfaceClosed
            ]
        );
    }
}
