#![forbid(unsafe_code)]

//! Deadline-ordered timer queue.
//!
//! This is the scheduling capability behind every deferred action in
//! watchline. Instead of storing callbacks, a timer stores a *key* (plain
//! data describing what should happen). The event loop pops due keys and
//! dispatches them itself, which keeps all mutable state in explicit records
//! and makes firing order deterministic.
//!
//! # Invariants
//!
//! - Timers fire in deadline order; ties fire in scheduling order.
//! - Cancelling a handle that already fired, was already cancelled, or was
//!   never issued is a no-op that returns `false`.
//! - Handles are never reused within one queue.
//!
//! # Usage
//!
//! ```
//! use std::time::{Duration, Instant};
//! use watchline_core::timer::TimerQueue;
//!
//! let start = Instant::now();
//! let mut timers = TimerQueue::new();
//! let flush = timers.after(start, Duration::from_millis(100), "flush");
//! timers.after(start, Duration::from_millis(50), "render");
//!
//! assert!(timers.pop_due(start).is_none());
//! let (_, key) = timers.pop_due(start + Duration::from_millis(60)).unwrap();
//! assert_eq!(key, "render");
//!
//! assert!(timers.cancel(flush));
//! assert!(!timers.cancel(flush));
//! assert!(timers.is_empty());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Opaque handle identifying one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw sequence number (useful in logs).
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Something that can schedule keyed timers and cancel them.
///
/// Implemented by [`TimerQueue`]. Debounce state is generic over it.
pub trait Schedule<K> {
    /// Schedule `key` to fire `delay` after `now`.
    fn after(&mut self, now: Instant, delay: Duration, key: K) -> TimerHandle;

    /// Cancel a timer. Returns `true` only if it was still pending.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

/// A min-queue of keyed timers.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    next_id: u64,
    entries: BTreeMap<(Instant, u64), K>,
    deadlines: HashMap<u64, Instant>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerQueue<K> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Schedule `key` to fire at `now + delay`.
    pub fn after(&mut self, now: Instant, delay: Duration, key: K) -> TimerHandle {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let deadline = now.checked_add(delay).unwrap_or(now);
        self.entries.insert((deadline, id), key);
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    /// Cancel a pending timer. Idempotent.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.entries.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }

    /// Cancel every pending timer whose key matches `predicate`.
    ///
    /// Returns the number of timers removed.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let doomed: Vec<(Instant, u64)> = self
            .entries
            .iter()
            .filter(|(_, key)| predicate(key))
            .map(|(slot, _)| *slot)
            .collect();
        for slot in &doomed {
            self.entries.remove(slot);
            self.deadlines.remove(&slot.1);
        }
        doomed.len()
    }

    /// Whether `handle` is still waiting to fire.
    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    /// Deadline of a pending timer.
    #[must_use]
    pub fn deadline(&self, handle: TimerHandle) -> Option<Instant> {
        self.deadlines.get(&handle.0).copied()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.first_key_value().map(|((deadline, _), _)| *deadline)
    }

    /// How long the event loop may sleep before the next timer is due.
    #[must_use]
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return the earliest timer if it is due at `now`.
    ///
    /// Callers loop on this rather than draining a batch, so a handler that
    /// schedules an already-due timer still sees it fire in order.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, K)> {
        let (deadline, id) = *self.entries.first_key_value()?.0;
        if deadline > now {
            return None;
        }
        let key = self.entries.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((TimerHandle(id), key))
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadlines.clear();
    }

    /// Iterate pending timers in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (TimerHandle, Instant, &K)> + '_ {
        self.entries
            .iter()
            .map(|((deadline, id), key)| (TimerHandle(*id), *deadline, key))
    }
}

impl<K> Schedule<K> for TimerQueue<K> {
    fn after(&mut self, now: Instant, delay: Duration, key: K) -> TimerHandle {
        TimerQueue::after(self, now, delay, key)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        TimerQueue::cancel(self, handle)
    }
}
