#![forbid(unsafe_code)]

//! Debounce state and the progress-render scheduler.
//!
//! A debounce *source* (a stream flush, a progress redraw) owns exactly one
//! [`DebounceState`]: the "scheduled" flag and the timer handle behind it.
//! The first event of a burst arms a timer; every later event in the same
//! window is absorbed. When the timer fires the owner calls
//! [`DebounceState::fired`] *before* doing the deferred work, so an event
//! that arrives during that work arms a fresh timer instead of being lost.
//!
//! [`DebounceScheduler`] layers an on/off switch and counters on top of one
//! state record. It is the component that limits live-status redraws to at
//! most one per window.
//!
//! # Coalescing Rule
//!
//! The window starts at the first `notify` of a burst and is *not* extended
//! by later calls. A burst of N notifications inside one window therefore
//! yields exactly one action, at `first_notify + window`, and that action
//! observes the newest state.

use std::time::{Duration, Instant};

use crate::timer::{Schedule, TimerHandle};

/// Scheduled flag plus the timer that will clear it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceState {
    pending: Option<TimerHandle>,
}

impl DebounceState {
    /// A state with nothing scheduled.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Whether a deferred action is waiting.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Handle of the pending timer, if any.
    #[must_use]
    pub const fn handle(&self) -> Option<TimerHandle> {
        self.pending
    }

    /// Arm a timer unless one is already pending.
    ///
    /// Returns the new handle, or `None` when the event was absorbed into the
    /// window that is already open.
    pub fn arm<K, S>(
        &mut self,
        timers: &mut S,
        now: Instant,
        window: Duration,
        key: K,
    ) -> Option<TimerHandle>
    where
        S: Schedule<K>,
    {
        if self.pending.is_some() {
            return None;
        }
        let handle = timers.after(now, window, key);
        self.pending = Some(handle);
        Some(handle)
    }

    /// Record that `handle` fired. Clears the flag only for the live timer.
    pub fn fired(&mut self, handle: TimerHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Cancel the pending timer, if any. Safe to call repeatedly.
    pub fn cancel<K, S>(&mut self, timers: &mut S) -> bool
    where
        S: Schedule<K>,
    {
        match self.pending.take() {
            Some(handle) => timers.cancel(handle),
            None => false,
        }
    }
}

/// Counters kept by a [`DebounceScheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// `notify` calls while enabled.
    pub notified: u64,
    /// Notifications absorbed into an already-open window.
    pub coalesced: u64,
    /// Windows that reached their deadline.
    pub fired: u64,
    /// Windows cancelled before firing.
    pub cancelled: u64,
}

/// Trailing-window coalescer for progress events.
#[derive(Debug, Clone)]
pub struct DebounceScheduler {
    window: Duration,
    enabled: bool,
    state: DebounceState,
    stats: DebounceStats,
}

impl DebounceScheduler {
    /// Create an enabled scheduler with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            enabled: true,
            state: DebounceState::new(),
            stats: DebounceStats::default(),
        }
    }

    /// Enable or disable the scheduler. A disabled scheduler ignores
    /// `notify` entirely (used when the output is not a terminal).
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Coalescing window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Whether `notify` does anything.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a render is waiting for its window to close.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.state.is_scheduled()
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> DebounceStats {
        self.stats
    }

    /// Register one progress event.
    ///
    /// Returns `true` when this call opened a new window.
    pub fn notify<K, S>(&mut self, timers: &mut S, now: Instant, key: K) -> bool
    where
        S: Schedule<K>,
    {
        if !self.enabled {
            return false;
        }
        self.stats.notified += 1;
        match self.state.arm(timers, now, self.window, key) {
            Some(_) => true,
            None => {
                self.stats.coalesced += 1;
                false
            }
        }
    }

    /// Record that a timer fired. Returns `true` if it was this scheduler's
    /// live timer and the render pass should run.
    pub fn fired(&mut self, handle: TimerHandle) -> bool {
        if self.state.fired(handle) {
            self.stats.fired += 1;
            true
        } else {
            false
        }
    }

    /// Drop a pending render. Idempotent.
    pub fn cancel<K, S>(&mut self, timers: &mut S) -> bool
    where
        S: Schedule<K>,
    {
        let cancelled = self.state.cancel(timers);
        if cancelled {
            self.stats.cancelled += 1;
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerQueue;

    const WINDOW: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn state_arms_once_per_window() {
        let start = Instant::now();
        let mut timers = TimerQueue::new();
        let mut state = DebounceState::new();

        assert!(state.arm(&mut timers, start, WINDOW, ()).is_some());
        assert!(state.is_scheduled());
        assert!(state.arm(&mut timers, start + ms(10), WINDOW, ()).is_none());
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn fired_clears_flag_only_for_live_handle() {
        let start = Instant::now();
        let mut timers = TimerQueue::new();
        let mut state = DebounceState::new();
        let handle = state.arm(&mut timers, start, WINDOW, ()).expect("armed");

        let stranger = timers.after(start, WINDOW, ());
        assert!(!state.fired(stranger));
        assert!(state.is_scheduled());

        assert!(state.fired(handle));
        assert!(!state.is_scheduled());
        assert!(!state.fired(handle));
    }

    #[test]
    fn rearm_after_fire_opens_new_window() {
        let start = Instant::now();
        let mut timers = TimerQueue::new();
        let mut state = DebounceState::new();
        state.arm(&mut timers, start, WINDOW, ());

        let (handle, ()) = timers.pop_due(start + WINDOW).expect("due");
        assert!(state.fired(handle));
        assert!(state.arm(&mut timers, start + WINDOW, WINDOW, ()).is_some());
    }

    #[test]
    fn cancel_twice_is_noop() {
        let start = Instant::now();
        let mut timers: TimerQueue<()> = TimerQueue::new();
        let mut state = DebounceState::new();
        state.arm(&mut timers, start, WINDOW, ());

        assert!(state.cancel(&mut timers));
        assert!(!state.cancel(&mut timers));
        assert!(timers.is_empty());
    }

    #[test]
    fn ten_notifies_in_fifty_ms_render_once_at_window_edge() {
        let start = Instant::now();
        let mut timers = TimerQueue::new();
        let mut scheduler = DebounceScheduler::new(WINDOW);

        for i in 0..10 {
            scheduler.notify(&mut timers, start + ms(i * 5), "render");
        }
        assert_eq!(timers.len(), 1);
        assert!(timers.pop_due(start + ms(99)).is_none());

        let (handle, key) = timers.pop_due(start + ms(100)).expect("render due");
        assert_eq!(key, "render");
        assert!(scheduler.fired(handle));
        assert!(timers.is_empty());

        let stats = scheduler.stats();
        assert_eq!(stats.notified, 10);
        assert_eq!(stats.coalesced, 9);
        assert_eq!(stats.fired, 1);
    }

    #[test]
    fn disabled_scheduler_ignores_notify() {
        let mut timers: TimerQueue<()> = TimerQueue::new();
        let mut scheduler = DebounceScheduler::new(WINDOW).with_enabled(false);

        assert!(!scheduler.notify(&mut timers, Instant::now(), ()));
        assert!(timers.is_empty());
        assert_eq!(scheduler.stats(), DebounceStats::default());
    }

    #[test]
    fn cancel_counts_only_real_cancellations() {
        let mut timers = TimerQueue::new();
        let mut scheduler = DebounceScheduler::new(WINDOW);
        scheduler.notify(&mut timers, Instant::now(), ());

        assert!(scheduler.cancel(&mut timers));
        assert!(!scheduler.cancel(&mut timers));
        assert_eq!(scheduler.stats().cancelled, 1);
        assert!(!scheduler.is_scheduled());
    }
}
