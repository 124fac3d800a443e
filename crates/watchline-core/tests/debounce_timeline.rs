//! Debounce scheduling over a simulated timeline.
//!
//! Drives `DebounceScheduler` with a `ManualClock` and a `TimerQueue` the
//! way an event loop would: notify on events, pop due timers on each tick.

use std::time::Duration;

use proptest::prelude::*;
use watchline_core::{Clock, DebounceScheduler, ManualClock, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Render;

#[derive(Debug, Clone)]
enum Step {
    Notify,
    Advance(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Notify),
        2 => (1u64..80).prop_map(Step::Advance),
    ]
}

/// Pops every due timer, returning how many were live renders.
fn drain(timers: &mut TimerQueue<Render>, sched: &mut DebounceScheduler, clock: &ManualClock) -> u64 {
    let mut fired = 0;
    while let Some((handle, Render)) = timers.pop_due(clock.now()) {
        if sched.fired(handle) {
            fired += 1;
        }
    }
    fired
}

#[test]
fn trailing_edge_fires_once_per_window() {
    let clock = ManualClock::new();
    let mut timers = TimerQueue::new();
    let mut sched = DebounceScheduler::new(Duration::from_millis(100));

    let start = clock.now();
    assert!(sched.notify(&mut timers, clock.now(), Render));
    for _ in 0..9 {
        clock.advance_ms(10);
        assert!(!sched.notify(&mut timers, clock.now(), Render));
    }
    assert_eq!(timers.next_deadline(), Some(start + Duration::from_millis(100)));

    clock.advance_ms(9);
    assert_eq!(drain(&mut timers, &mut sched, &clock), 0);
    clock.advance_ms(1);
    assert_eq!(drain(&mut timers, &mut sched, &clock), 1);

    let stats = sched.stats();
    assert_eq!((stats.notified, stats.coalesced, stats.fired), (10, 9, 1));
    assert!(timers.is_empty());
}

#[test]
fn cancelled_window_reopens_on_next_notify() {
    let clock = ManualClock::new();
    let mut timers = TimerQueue::new();
    let mut sched = DebounceScheduler::new(Duration::from_millis(50));

    sched.notify(&mut timers, clock.now(), Render);
    assert!(sched.cancel(&mut timers));
    assert!(!sched.cancel(&mut timers));
    assert!(timers.is_empty());

    clock.advance_ms(200);
    assert_eq!(drain(&mut timers, &mut sched, &clock), 0);
    assert!(sched.notify(&mut timers, clock.now(), Render));
    clock.advance_ms(50);
    assert_eq!(drain(&mut timers, &mut sched, &clock), 1);
}

#[test]
fn disabled_scheduler_never_arms() {
    let clock = ManualClock::new();
    let mut timers = TimerQueue::new();
    let mut sched = DebounceScheduler::new(Duration::from_millis(50)).with_enabled(false);

    assert!(!sched.notify(&mut timers, clock.now(), Render));
    assert!(timers.is_empty());
    assert_eq!(sched.stats().notified, 0);
}

proptest! {
    #[test]
    fn every_notify_is_followed_by_a_render_within_one_window(
        steps in proptest::collection::vec(step(), 0..80),
        window_ms in 1u64..150,
    ) {
        let clock = ManualClock::new();
        let mut timers = TimerQueue::new();
        let mut sched = DebounceScheduler::new(Duration::from_millis(window_ms));
        let mut elapsed = 0u64;
        let mut fired = 0u64;

        for step in steps {
            match step {
                Step::Notify => {
                    sched.notify(&mut timers, clock.now(), Render);
                }
                Step::Advance(ms) => {
                    clock.advance_ms(ms);
                    elapsed += ms;
                    fired += drain(&mut timers, &mut sched, &clock);
                }
            }
            prop_assert!(timers.len() <= 1);
            prop_assert_eq!(timers.is_empty(), !sched.is_scheduled());
        }

        clock.advance_ms(window_ms);
        elapsed += window_ms;
        fired += drain(&mut timers, &mut sched, &clock);

        prop_assert!(!sched.is_scheduled());
        prop_assert!(timers.is_empty());
        let stats = sched.stats();
        prop_assert_eq!(stats.fired, fired);
        prop_assert_eq!(stats.notified, stats.coalesced + stats.fired);
        prop_assert!(fired <= elapsed / window_ms + 1);
    }
}
