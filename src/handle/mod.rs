//! Caller-facing handle for one open dialog.
//!
//! The handle wraps a single-result completion slot (settles at most
//! once, then stays settled), a command queue drained by the owning
//! manager, and an optional pre-close confirmation guard. Handle calls
//! never mutate the surface directly; they enqueue work so a fragment
//! event handler can close its own dialog without re-entering a running
//! transition.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

/// Payload map passed to `update_data`.
pub type DataPayload = Map<String, Value>;

type ResultSubscriber = Box<dyn FnOnce(Option<Value>) + Send>;

#[derive(Default)]
struct ResultInner {
    settled: bool,
    value: Option<Option<Value>>,
    subscribers: Vec<ResultSubscriber>,
}

/// One-shot completion stream: emits a single result, then completes.
#[derive(Clone, Default)]
pub struct ResultSlot {
    inner: Arc<Mutex<ResultInner>>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle the slot. The first caller wins; later calls return false
    /// and emit nothing.
    pub fn settle(&self, result: Option<Value>) -> bool {
        let subscribers = {
            let Ok(mut inner) = self.inner.lock() else {
                return false;
            };
            if inner.settled {
                return false;
            }
            inner.settled = true;
            inner.value = Some(result.clone());
            std::mem::take(&mut inner.subscribers)
        };

        for subscriber in subscribers {
            subscriber(result.clone());
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().map(|inner| inner.settled).unwrap_or(false)
    }

    /// The settled result, if any. `Some(None)` means the dialog closed
    /// without a result.
    pub fn result(&self) -> Option<Option<Value>> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.value.clone())
    }

    /// Observe the single emission. Subscribing after settlement fires
    /// immediately with the stored result.
    pub fn subscribe(&self, subscriber: impl FnOnce(Option<Value>) + Send + 'static) {
        let immediate = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            if inner.settled {
                inner.value.clone()
            } else {
                inner.subscribers.push(Box::new(subscriber));
                return;
            }
        };
        if let Some(value) = immediate {
            subscriber(value);
        }
    }
}

/// Work item enqueued by a handle, drained by the manager pump.
pub enum HandleCommand {
    Close {
        result: Option<Value>,
        forced: bool,
    },
    UpdateData(DataPayload),
}

/// Shared queue between a handle and its owning manager.
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<HandleCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: HandleCommand) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.push_back(command);
        }
    }

    pub fn drain(&self) -> Vec<HandleCommand> {
        self.inner
            .lock()
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

/// Verdict from a pre-close confirmation guard.
pub enum GuardOutcome {
    /// Proceed with the close.
    Allow,
    /// Keep the dialog open.
    Deny,
    /// Decision arrives later through the paired resolver.
    Pending(GuardTicket),
}

/// Reader side of a deferred guard decision.
#[derive(Clone)]
pub struct GuardTicket {
    cell: Arc<Mutex<Option<bool>>>,
}

impl GuardTicket {
    pub fn decision(&self) -> Option<bool> {
        self.cell.lock().ok().and_then(|cell| *cell)
    }
}

/// Writer side of a deferred guard decision. The first resolution wins.
#[derive(Clone)]
pub struct GuardResolver {
    cell: Arc<Mutex<Option<bool>>>,
}

impl GuardResolver {
    pub fn resolve(&self, allow: bool) {
        if let Ok(mut cell) = self.cell.lock() {
            if cell.is_none() {
                *cell = Some(allow);
            }
        }
    }
}

pub fn guard_channel() -> (GuardResolver, GuardTicket) {
    let cell = Arc::new(Mutex::new(None));
    (
        GuardResolver {
            cell: Arc::clone(&cell),
        },
        GuardTicket { cell },
    )
}

/// Guard evaluated on cancel-closes (no explicit result).
pub type CloseGuard = Box<dyn FnMut() -> GuardOutcome + Send>;

#[derive(Clone, Default)]
pub struct GuardSlot {
    inner: Arc<Mutex<Option<CloseGuard>>>,
}

impl GuardSlot {
    pub fn set(&self, guard: CloseGuard) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(guard);
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Take the guard out for evaluation. The caller puts it back with
    /// [`GuardSlot::restore`]; evaluating outside the lock lets the guard
    /// body touch the handle without deadlocking.
    pub fn take(&self) -> Option<CloseGuard> {
        self.inner.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn restore(&self, guard: CloseGuard) {
        if let Ok(mut slot) = self.inner.lock() {
            if slot.is_none() {
                *slot = Some(guard);
            }
        }
    }
}

/// Handle returned by an imperative open.
#[derive(Clone)]
pub struct DialogHandle {
    id: String,
    commands: CommandQueue,
    result: ResultSlot,
    guard: GuardSlot,
}

impl DialogHandle {
    pub fn new(id: impl Into<String>, commands: CommandQueue, result: ResultSlot, guard: GuardSlot) -> Self {
        Self {
            id: id.into(),
            commands,
            result,
            guard,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Request a close. An explicit result always proceeds; `None` is a
    /// cancel and runs the confirmation guard first, if one is set.
    pub fn close(&self, result: Option<Value>) {
        self.commands.push(HandleCommand::Close {
            result,
            forced: false,
        });
    }

    /// Push an updated payload onto the live injected fragment.
    pub fn update_data(&self, partial: DataPayload) {
        self.commands.push(HandleCommand::UpdateData(partial));
    }

    /// Observe the single close result.
    pub fn on_result(&self, subscriber: impl FnOnce(Option<Value>) + Send + 'static) {
        self.result.subscribe(subscriber);
    }

    pub fn result_slot(&self) -> &ResultSlot {
        &self.result
    }

    pub fn set_before_close_guard(&self, guard: CloseGuard) {
        self.guard.set(guard);
    }

    pub fn guard_slot(&self) -> &GuardSlot {
        &self.guard
    }
}

/// Opt-in confirmation wrapper.
///
/// Kept separate from the handle constructor so plain callers never pay
/// for confirmation plumbing; attaching later is a one-liner.
pub fn confirm_before_close(
    handle: &DialogHandle,
    confirm: impl FnMut() -> GuardOutcome + Send + 'static,
) {
    handle.set_before_close_guard(Box::new(confirm));
}
