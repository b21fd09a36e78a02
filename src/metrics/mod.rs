use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by the overlay engine. Wrapped in
/// `Arc<Mutex<..>>` by the environment so every surface shares one set.
#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    opens: u64,
    closes: u64,
    dismissals: u64,
    forced_closes: u64,
    fragments_created: u64,
    fragments_destroyed: u64,
    data_updates: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_open(&mut self) {
        self.opens = self.opens.saturating_add(1);
    }

    pub fn record_close(&mut self) {
        self.closes = self.closes.saturating_add(1);
    }

    pub fn record_dismissal(&mut self) {
        self.dismissals = self.dismissals.saturating_add(1);
    }

    pub fn record_forced_close(&mut self) {
        self.forced_closes = self.forced_closes.saturating_add(1);
    }

    pub fn record_fragment_created(&mut self) {
        self.fragments_created = self.fragments_created.saturating_add(1);
    }

    pub fn record_fragment_destroyed(&mut self) {
        self.fragments_destroyed = self.fragments_destroyed.saturating_add(1);
    }

    pub fn record_data_update(&mut self) {
        self.data_updates = self.data_updates.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            opens: self.opens,
            closes: self.closes,
            dismissals: self.dismissals,
            forced_closes: self.forced_closes,
            fragments_created: self.fragments_created,
            fragments_destroyed: self.fragments_destroyed,
            data_updates: self.data_updates,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub opens: u64,
    pub closes: u64,
    pub dismissals: u64,
    pub forced_closes: u64,
    pub fragments_created: u64,
    pub fragments_destroyed: u64,
    pub data_updates: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "engine_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("opens".to_string(), json!(self.opens));
        map.insert("closes".to_string(), json!(self.closes));
        map.insert("dismissals".to_string(), json!(self.dismissals));
        map.insert("forced_closes".to_string(), json!(self.forced_closes));
        map.insert(
            "fragments_created".to_string(),
            json!(self.fragments_created),
        );
        map.insert(
            "fragments_destroyed".to_string(),
            json!(self.fragments_destroyed),
        );
        map.insert("data_updates".to_string(), json!(self.data_updates));
        map
    }
}
