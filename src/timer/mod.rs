//! Deferred-work primitives used to sequence page mutations with CSS
//! transitions without blocking the host's event loop.
//!
//! Two queues cover the engine's suspension points. [`TimerQueue`] holds
//! cancellable entries that fire once a deadline passes (close teardown,
//! navigation grace, the stacking settle tick). [`FrameQueue`] holds
//! entries that fire on the *next* drain, one hop per drain, mirroring
//! animation-frame boundaries. Neither queue reads the clock itself;
//! callers pass `Instant`s, which keeps every schedule deterministic
//! under test.

use std::time::{Duration, Instant};

/// Identifier for a scheduled entry, usable to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEntry<T> {
    id: TimerId,
    fire_at: Instant,
    payload: T,
}

/// Ordered queue of cancellable one-shot delays.
pub struct TimerQueue<T> {
    entries: Vec<TimerEntry<T>>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` to fire once `now + delay` has passed.
    pub fn schedule(&mut self, now: Instant, delay: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry {
            id,
            fire_at: now + delay,
            payload,
        });
        id
    }

    /// Cancel a pending entry. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Remove and return every entry whose deadline has passed, in
    /// firing order.
    pub fn drain_due(&mut self, now: Instant) -> Vec<T> {
        let mut due: Vec<TimerEntry<T>> = Vec::new();
        let mut remaining: Vec<TimerEntry<T>> = Vec::new();
        for entry in self.entries.drain(..) {
            if entry.fire_at <= now {
                due.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;
        due.sort_by_key(|entry| (entry.fire_at, entry.id.0));
        due.into_iter().map(|entry| entry.payload).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline, if any. Hosts use this to size their
    /// poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.fire_at).min()
    }
}

/// Queue that releases entries on the next drain.
///
/// Callers take the whole batch before executing it, so an entry pushed
/// while a batch runs lands in the following drain. Two chained pushes
/// therefore take two frames, the spacing the engine needs between
/// attaching content and opening a surface.
pub struct FrameQueue<T> {
    queued: Vec<T>,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self { queued: Vec::new() }
    }
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: T) {
        self.queued.push(payload);
    }

    /// Release everything queued before this frame.
    pub fn next_frame(&mut self) -> Vec<T> {
        std::mem::take(&mut self.queued)
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
