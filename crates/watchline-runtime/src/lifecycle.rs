#![forbid(unsafe_code)]

//! Run/rerun phase tracking.
//!
//! ```text
//!  Idle ──▶ Collecting ──▶ Running ──▶ Finished
//!              ▲                          │
//!              │                          ▼
//!              └────────────────────── Rerunning
//! ```
//!
//! Hooks come from an external driver, so `apply` accepts every event in
//! every phase. Events that do not fit the diagram are logged and resolved
//! to the nearest sensible phase rather than rejected.

use std::fmt;

use tracing::debug;

/// Phase of the watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Collecting,
    Running,
    Finished,
    Rerunning,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Rerunning => "rerunning",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    PathsCollected,
    Collected,
    TaskUpdated,
    Finished,
    WatcherStart,
    WatcherRerun,
    TestRemoved,
    /// The rerun notice reached the buffered path.
    RerunNoticed,
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub event: LifecycleEvent,
}

impl Transition {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// Entered `Collecting` from another phase.
    #[must_use]
    pub fn entered_collecting(&self) -> bool {
        self.changed() && self.to == Phase::Collecting
    }

    /// Entered `Collecting` from outside a run. Collection repeated while a
    /// run is in progress does not start a new one.
    #[must_use]
    pub fn starts_run(&self) -> bool {
        self.to == Phase::Collecting
            && matches!(self.from, Phase::Idle | Phase::Finished | Phase::Rerunning)
    }
}

/// Phase machine with transition counters.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    phase: Phase,
    transitions: u64,
    unexpected: u64,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of phase changes so far.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Events that arrived out of order.
    #[must_use]
    pub fn unexpected(&self) -> u64 {
        self.unexpected
    }

    /// Apply `event` and return the transition taken.
    pub fn apply(&mut self, event: LifecycleEvent) -> Transition {
        use LifecycleEvent as E;
        use Phase as P;

        let from = self.phase;
        let (to, expected) = match (from, event) {
            (_, E::PathsCollected) => (P::Collecting, true),

            (P::Collecting | P::Running, E::Collected) => (from, true),
            (P::Idle, E::Collected) => (P::Collecting, false),
            (_, E::Collected) => (from, false),

            (P::Collecting | P::Running, E::TaskUpdated) => (P::Running, true),
            (_, E::TaskUpdated) => (from, false),

            (P::Collecting | P::Running, E::Finished) => (P::Finished, true),
            (_, E::Finished) => (P::Finished, false),

            (P::Idle, E::WatcherStart) => (P::Idle, true),
            (P::Finished | P::Rerunning, E::WatcherStart) => (P::Finished, true),
            (_, E::WatcherStart) => (P::Finished, false),

            (P::Finished | P::Idle, E::WatcherRerun | E::TestRemoved) => (P::Rerunning, true),
            (_, E::WatcherRerun | E::TestRemoved) => (P::Rerunning, false),

            (P::Rerunning, E::RerunNoticed) => (P::Collecting, true),
            (_, E::RerunNoticed) => (from, false),
        };

        if !expected {
            self.unexpected += 1;
            debug!(%from, ?event, %to, "out-of-order lifecycle event");
        }
        if to != from {
            self.transitions += 1;
        }
        self.phase = to;
        Transition { from, to, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;

    fn run(events: &[LifecycleEvent]) -> Lifecycle {
        let mut lc = Lifecycle::new();
        for event in events {
            lc.apply(*event);
        }
        lc
    }

    #[test]
    fn normal_run() {
        let lc = run(&[E::PathsCollected, E::Collected, E::TaskUpdated, E::TaskUpdated, E::Finished]);
        assert_eq!(lc.phase(), Phase::Finished);
        assert_eq!(lc.transitions(), 3);
        assert_eq!(lc.unexpected(), 0);
    }

    #[test]
    fn rerun_cycle_returns_to_collecting() {
        let mut lc = run(&[E::PathsCollected, E::TaskUpdated, E::Finished, E::WatcherStart]);
        let t = lc.apply(E::WatcherRerun);
        assert_eq!((t.from, t.to), (Phase::Finished, Phase::Rerunning));
        let t = lc.apply(E::RerunNoticed);
        assert!(t.entered_collecting());
        let t = lc.apply(E::PathsCollected);
        assert!(!t.changed());
    }

    #[test]
    fn collection_starts_a_run_only_from_outside_one() {
        let mut lc = Lifecycle::new();
        assert!(lc.apply(E::PathsCollected).starts_run());
        lc.apply(E::TaskUpdated);

        let again = lc.apply(E::PathsCollected);
        assert_eq!((again.from, again.to), (Phase::Running, Phase::Collecting));
        assert!(!again.starts_run());

        lc.apply(E::Finished);
        assert!(lc.apply(E::PathsCollected).starts_run());
    }

    #[test]
    fn rerun_while_running_is_accepted() {
        let mut lc = run(&[E::PathsCollected, E::TaskUpdated]);
        let t = lc.apply(E::WatcherRerun);
        assert_eq!(t.to, Phase::Rerunning);
        assert_eq!(lc.unexpected(), 1);
    }

    #[test]
    fn late_task_update_keeps_finished() {
        let mut lc = run(&[E::PathsCollected, E::TaskUpdated, E::Finished]);
        let t = lc.apply(E::TaskUpdated);
        assert_eq!(t.to, Phase::Finished);
        assert!(!t.changed());
        assert_eq!(lc.unexpected(), 1);
    }

    #[test]
    fn test_removed_then_watcher_start_waits() {
        let mut lc = run(&[E::PathsCollected, E::TaskUpdated, E::Finished, E::WatcherStart]);
        assert_eq!(lc.apply(E::TestRemoved).to, Phase::Rerunning);
        assert_eq!(lc.apply(E::WatcherStart).to, Phase::Finished);
        assert_eq!(lc.unexpected(), 0);
    }

    #[test]
    fn watcher_start_before_any_run_stays_idle() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.apply(E::WatcherStart).to, Phase::Idle);
        assert_eq!(lc.transitions(), 0);
    }
}
