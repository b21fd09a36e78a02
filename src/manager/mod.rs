//! Imperative dialog façade.
//!
//! The manager opens surfaces outside any declarative render tree:
//! it builds the handle before any UI exists, attaches the surface
//! hidden, injects content one frame later, opens on the frame after
//! that, and tears the instance down a fixed delay after close so exit
//! transitions can finish. All handle traffic funnels through per-
//! instance command queues drained by [`DialogManager::pump_at`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::KeyEvent;
use serde_json::{Value, json};

use crate::config::DialogConfig;
use crate::engine::{
    DialogAuditEvent, DialogAuditStage, DialogCore, DialogEnv, DialogPhase,
};
use crate::fragment::FragmentFactory;
use crate::handle::{
    CommandQueue, DataPayload, DialogHandle, GuardOutcome, GuardSlot, GuardTicket, HandleCommand,
    ResultSlot,
};
use crate::host::HostPage;
use crate::logging::{LogLevel, json_kv};
use crate::timer::{FrameQueue, TimerQueue};

/// Delay between a close and instance teardown, sized to let the exit
/// transition play out.
pub const TEARDOWN_DELAY: Duration = Duration::from_millis(300);
/// Default interval between metrics snapshot emissions.
pub const METRICS_EMIT_INTERVAL: Duration = Duration::from_secs(5);

const LOG_TARGET: &str = "scrim::manager";
const METRICS_TARGET: &str = "scrim::manager.metrics";

/// Notification emitted once an instance is fully torn down.
#[derive(Debug, Clone)]
pub struct ClosedNotice {
    pub id: String,
    pub result: Option<Value>,
}

enum ManagerTask {
    Inject(String),
    OpenSurface(String),
}

enum TimedTask {
    Teardown(String),
}

struct DialogInstance {
    core: DialogCore,
    handle: DialogHandle,
    commands: CommandQueue,
    result: ResultSlot,
    guard: GuardSlot,
    guard_pending: Option<GuardTicket>,
    is_closing: bool,
}

/// Registry-backed imperative dialog service.
pub struct DialogManager {
    env: DialogEnv,
    instances: HashMap<String, DialogInstance>,
    frames: FrameQueue<ManagerTask>,
    timers: TimerQueue<TimedTask>,
    next_id: u64,
    closed_listeners: Vec<Box<dyn FnMut(&ClosedNotice) + Send>>,
    metrics_interval: Duration,
    started_at: Option<Instant>,
    last_metrics_emit: Option<Instant>,
}

impl DialogManager {
    pub fn new(env: DialogEnv) -> Self {
        Self {
            env,
            instances: HashMap::new(),
            frames: FrameQueue::new(),
            timers: TimerQueue::new(),
            next_id: 1,
            closed_listeners: Vec::new(),
            metrics_interval: METRICS_EMIT_INTERVAL,
            started_at: None,
            last_metrics_emit: None,
        }
    }

    /// Interval between metrics snapshot emissions. Zero disables
    /// snapshots.
    pub fn set_metrics_interval(&mut self, interval: Duration) {
        self.metrics_interval = interval;
    }

    pub fn env(&self) -> &DialogEnv {
        &self.env
    }

    /// Open a dialog from a normalized config. The returned handle is
    /// live immediately; the surface becomes visible two frames later.
    pub fn open(&mut self, config: DialogConfig) -> DialogHandle {
        let id = format!("scrim-surface-{}", self.next_id);
        self.next_id += 1;
        let config = config.normalized();

        let result = ResultSlot::new();
        let commands = CommandQueue::new();
        let guard = GuardSlot::default();
        let handle = DialogHandle::new(&id, commands.clone(), result.clone(), guard.clone());

        let mut core = DialogCore::new(&id, config, self.env.clone());
        core.set_managed(commands.clone());
        core.prepare_attached();

        self.frames.push(ManagerTask::Inject(id.clone()));
        self.instances.insert(
            id.clone(),
            DialogInstance {
                core,
                handle: handle.clone(),
                commands,
                result,
                guard,
                guard_pending: None,
                is_closing: false,
            },
        );

        self.env.log(
            LogLevel::Info,
            LOG_TARGET,
            "open_requested",
            vec![json_kv("id", json!(id))],
        );
        handle
    }

    /// Open a dialog around an injectable fragment type.
    pub fn open_fragment(&mut self, factory: FragmentFactory, config: DialogConfig) -> DialogHandle {
        self.open(config.body_fragment(factory))
    }

    /// Drive one animation-frame boundary.
    pub fn frame(&mut self, now: Instant) {
        for task in self.frames.next_frame() {
            match task {
                ManagerTask::Inject(id) => {
                    // An instance closed before its frames ran must not
                    // be injected into or reopened.
                    let injected = match self.instances.get_mut(&id) {
                        Some(instance) if !instance.is_closing => {
                            let handle = instance.handle.clone();
                            if let Err(err) = instance.core.inject_body_content(Some(handle)) {
                                self.env.log(
                                    LogLevel::Warn,
                                    LOG_TARGET,
                                    "fragment_injection_failed",
                                    vec![
                                        json_kv("id", json!(id.clone())),
                                        json_kv("error", json!(err.to_string())),
                                    ],
                                );
                            }
                            instance.core.wire_close_event();
                            true
                        }
                        _ => false,
                    };
                    if injected {
                        self.frames.push(ManagerTask::OpenSurface(id));
                    }
                }
                ManagerTask::OpenSurface(id) => {
                    if let Some(instance) = self.instances.get_mut(&id) {
                        if !instance.is_closing {
                            instance.core.open(now);
                        }
                    }
                }
            }
        }
    }

    /// Drain handle commands, pending guards, timed teardowns, and each
    /// core's internal delays.
    pub fn pump_at(&mut self, now: Instant) {
        let ids: Vec<String> = self.instances.keys().cloned().collect();
        for id in &ids {
            let commands = match self.instances.get(id) {
                Some(instance) => instance.commands.drain(),
                None => continue,
            };
            for command in commands {
                match command {
                    HandleCommand::Close { result, forced } => {
                        self.close_inner(id, result, forced, now);
                    }
                    HandleCommand::UpdateData(partial) => {
                        self.update_data(id, &partial);
                    }
                }
            }
            self.poll_guard(id, now);
        }

        for task in self.timers.drain_due(now) {
            match task {
                TimedTask::Teardown(id) => self.finish_teardown(&id),
            }
        }

        for instance in self.instances.values_mut() {
            instance.core.pump_at(now);
        }

        self.maybe_emit_metrics(now);
    }

    /// Request a close. Cancel closes (no result) consult the instance's
    /// confirmation guard; explicit results always proceed.
    pub fn close(&mut self, id: &str, result: Option<Value>, now: Instant) {
        self.close_inner(id, result, false, now);
    }

    /// Close every registered instance, iterating over a snapshot of the
    /// registry keys.
    pub fn close_all(&mut self, now: Instant) {
        let ids: Vec<String> = self.instances.keys().cloned().collect();
        for id in ids {
            self.close_inner(&id, None, false, now);
        }
    }

    /// Copy an updated payload onto the instance's live fragment. No-op
    /// when the instance has none.
    pub fn update_data(&mut self, id: &str, partial: &DataPayload) {
        if let Some(instance) = self.instances.get_mut(id) {
            instance.core.apply_content_data(partial);
        }
    }

    /// Fan a navigation-start notification out to every instance.
    pub fn on_external_navigation(&mut self, destination: &str, now: Instant) {
        for instance in self.instances.values_mut() {
            instance.core.on_external_navigation(destination, now);
        }
    }

    /// Fan a key event out; surfaces self-filter to the topmost.
    pub fn handle_key(&mut self, key: &KeyEvent, now: Instant) {
        for instance in self.instances.values_mut() {
            instance.core.handle_key(key, now);
        }
    }

    /// A click landed on the shared backdrop.
    pub fn handle_backdrop_click(&mut self, now: Instant) {
        for instance in self.instances.values_mut() {
            instance.core.handle_backdrop_click(now);
        }
    }

    /// The close button of a specific surface was pressed.
    pub fn handle_close_button(&mut self, id: &str, now: Instant) {
        if let Some(instance) = self.instances.get_mut(id) {
            instance.core.handle_close_button(now);
        }
    }

    pub fn on_closed(&mut self, listener: impl FnMut(&ClosedNotice) + Send + 'static) {
        self.closed_listeners.push(Box::new(listener));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn surface_phase(&self, id: &str) -> Option<DialogPhase> {
        self.instances.get(id).map(|instance| instance.core.phase())
    }

    /// Earliest pending deadline across the manager's timers and every
    /// core, for hosts sizing their poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        let core_deadline = self
            .instances
            .values()
            .filter_map(|instance| instance.core.next_deadline())
            .min();
        match (self.timers.next_deadline(), core_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn close_inner(&mut self, id: &str, result: Option<Value>, forced: bool, now: Instant) {
        let Some(instance) = self.instances.get_mut(id) else {
            return;
        };
        if instance.is_closing {
            return;
        }

        if result.is_none() && !forced {
            // Guard gating, cancel path only. A pending evaluation is
            // never re-entered.
            if instance.guard_pending.is_some() {
                return;
            }
            if let Some(mut guard) = instance.guard.take() {
                let outcome = guard();
                instance.guard.restore(guard);
                match outcome {
                    GuardOutcome::Allow => {}
                    GuardOutcome::Deny => {
                        self.env.log(
                            LogLevel::Debug,
                            LOG_TARGET,
                            "close_rejected_by_guard",
                            vec![json_kv("id", json!(id))],
                        );
                        return;
                    }
                    GuardOutcome::Pending(ticket) => {
                        instance.guard_pending = Some(ticket);
                        return;
                    }
                }
            }
        } else {
            // Explicit results and forced closes win over a pending
            // guard decision.
            instance.guard_pending = None;
        }

        self.proceed_close(id, result, forced, now);
    }

    fn proceed_close(&mut self, id: &str, result: Option<Value>, forced: bool, now: Instant) {
        let Some(instance) = self.instances.get_mut(id) else {
            return;
        };
        if instance.is_closing {
            return;
        }
        instance.is_closing = true;
        instance.core.close(result.clone(), forced, now);
        instance.result.settle(result);
        self.timers
            .schedule(now, TEARDOWN_DELAY, TimedTask::Teardown(id.to_string()));
        self.env.log(
            LogLevel::Info,
            LOG_TARGET,
            "close_committed",
            vec![json_kv("id", json!(id)), json_kv("forced", json!(forced))],
        );
    }

    fn poll_guard(&mut self, id: &str, now: Instant) {
        let decision = match self.instances.get(id) {
            Some(instance) => instance
                .guard_pending
                .as_ref()
                .and_then(|ticket| ticket.decision()),
            None => return,
        };
        let Some(allow) = decision else {
            return;
        };
        if let Some(instance) = self.instances.get_mut(id) {
            instance.guard_pending = None;
        }
        if allow {
            self.proceed_close(id, None, false, now);
        } else {
            self.env.log(
                LogLevel::Debug,
                LOG_TARGET,
                "close_rejected_by_guard",
                vec![json_kv("id", json!(id))],
            );
        }
    }

    fn maybe_emit_metrics(&mut self, now: Instant) {
        if self.env.metrics.is_none() || self.metrics_interval.is_zero() {
            return;
        }
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.metrics_interval => return,
            _ => self.last_metrics_emit = Some(now),
        }
        let started = *self.started_at.get_or_insert(now);
        if let (Some(logger), Some(metrics)) =
            (self.env.logger.as_ref(), self.env.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let snapshot = guard.snapshot(now.duration_since(started));
                let _ = logger.log_event(snapshot.to_log_event(METRICS_TARGET));
            }
        }
    }

    fn finish_teardown(&mut self, id: &str) {
        let Some(instance) = self.instances.remove(id) else {
            return;
        };
        if let Some(page) = self.env.window.document() {
            page.remove_node(id);
        }
        let notice = ClosedNotice {
            id: id.to_string(),
            result: instance.result.result().unwrap_or(None),
        };
        for listener in self.closed_listeners.iter_mut() {
            listener(&notice);
        }
        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::TeardownCompleted)
                .detail("id", json!(id)),
        );
        self.env.log(
            LogLevel::Info,
            LOG_TARGET,
            "instance_torn_down",
            vec![json_kv("id", json!(id))],
        );
        drop(instance);
    }
}

/// Convenience drive helper: one frame boundary followed by a pump.
pub fn advance(manager: &mut DialogManager, now: Instant) {
    manager.frame(now);
    manager.pump_at(now);
}
