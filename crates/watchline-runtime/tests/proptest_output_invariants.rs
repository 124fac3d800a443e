//! Property-based invariants of the output arbiter.
//!
//! 1. Stdout output, with status frames removed, equals the concatenation
//!    of stdout writes. Same for stderr. The only extra bytes are line
//!    breaks ending an open line before a frame, at most one per frame.
//! 2. At every step, what has reached a sink is a prefix of what was written.
//! 3. Status frames alternate: at most one live frame is on screen at a time,
//!    and every frame starts at the beginning of a line.
//! 4. `settle` leaves no pending timers and nothing buffered.
//! 5. Progress notifications never produce more renders than windows elapsed.

use std::io::Write;
use std::time::Duration;

use proptest::prelude::*;
use watchline_runtime::{
    ArbiterOptions, CaptureSink, FileResult, FlushPolicy, LiveRenderer, ManualClock,
    OutputArbiter, RenderResult, StreamId,
};

struct Frame;

impl LiveRenderer for Frame {
    fn update_files(&mut self, _files: Vec<FileResult>) {}

    fn draw(&mut self, out: &mut dyn Write) -> RenderResult<()> {
        out.write_all(b"{S}")?;
        Ok(())
    }

    fn erase(&mut self, out: &mut dyn Write) -> RenderResult<()> {
        out.write_all(b"{E}")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Write(StreamId, String),
    Advance(u64),
    Notify,
    Flush(StreamId),
    Remount,
}

fn stream() -> impl Strategy<Value = StreamId> {
    prop_oneof![Just(StreamId::Stdout), Just(StreamId::Stderr)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (stream(), "[a-z \n]{0,12}").prop_map(|(s, t)| Op::Write(s, t)),
        3 => (0u64..250).prop_map(Op::Advance),
        2 => Just(Op::Notify),
        1 => stream().prop_map(Op::Flush),
        1 => Just(Op::Remount),
    ]
}

fn strip(text: &str) -> String {
    text.replace("{S}", "").replace("{E}", "").replace("{R}", "")
}

/// Text with line breaks removed, for comparing modulo inserted breaks.
fn joined(text: &str) -> String {
    text.replace('\n', "")
}

fn extra_breaks(actual: &str, expected: &str) -> usize {
    actual.matches('\n').count().saturating_sub(expected.matches('\n').count())
}

/// A frame may follow the start of output, a newline, or another marker.
fn frames_start_lines(text: &str) -> bool {
    text.match_indices("{S}")
        .all(|(idx, _)| idx == 0 || matches!(text.as_bytes()[idx - 1], b'\n' | b'}'))
}

fn frames_balanced(text: &str) -> bool {
    let mut on_screen = false;
    let mut rest = text;
    while let Some(idx) = rest.find('{') {
        match &rest[idx..idx + 3] {
            "{S}" if !on_screen => on_screen = true,
            "{E}" if on_screen => on_screen = false,
            // A stopped renderer leaves its last frame behind.
            "{R}" => on_screen = false,
            _ => return false,
        }
        rest = &rest[idx + 3..];
    }
    true
}

proptest! {
    #[test]
    fn output_is_concatenation_of_writes(
        ops in proptest::collection::vec(op(), 0..60),
        window_ms in 0u64..150,
    ) {
        let clock = ManualClock::new();
        let out = CaptureSink::new();
        let err = CaptureSink::new();
        let policy = if window_ms == 0 {
            FlushPolicy::Immediate
        } else {
            FlushPolicy::Windowed(Duration::from_millis(window_ms))
        };
        let mut arb = OutputArbiter::new(
            Box::new(out.clone()),
            Box::new(err.clone()),
            Box::new(clock.clone()),
            ArbiterOptions { stdout_policy: policy, ..ArbiterOptions::default() },
        );
        arb.mount(Box::new(Frame));

        let mut expected_out = String::new();
        let mut expected_err = String::new();
        let mut elapsed = 0u64;
        let mut notified = false;

        for op in ops {
            match op {
                Op::Write(StreamId::Stdout, text) => {
                    expected_out.push_str(&text);
                    arb.write(StreamId::Stdout, text);
                }
                Op::Write(StreamId::Stderr, text) => {
                    expected_err.push_str(&text);
                    arb.write(StreamId::Stderr, text);
                }
                Op::Advance(ms) => {
                    clock.advance_ms(ms);
                    elapsed += ms;
                    arb.poll();
                }
                Op::Notify => {
                    notified |= arb.notify_progress();
                }
                Op::Flush(stream) => {
                    prop_assert!(arb.flush(stream).is_ok());
                }
                Op::Remount => {
                    out.clone().write_all(b"{R}").unwrap();
                    arb.mount(Box::new(Frame));
                }
            }
            prop_assert!(joined(&expected_out).starts_with(&joined(&strip(&out.contents()))));
            prop_assert_eq!(joined(&err.contents()), joined(&expected_err));
            prop_assert!(frames_balanced(&out.contents()));
            prop_assert!(frames_start_lines(&out.contents()));
        }

        prop_assert!(arb.settle().is_ok());
        let frames = out.contents().matches("{S}").count();
        let stdout = strip(&out.contents());
        prop_assert_eq!(joined(&stdout), joined(&expected_out));
        prop_assert!(stdout.matches('\n').count() >= expected_out.matches('\n').count());
        prop_assert!(extra_breaks(&stdout, &expected_out) + extra_breaks(&err.contents(), &expected_err) <= frames);
        prop_assert_eq!(joined(&err.contents()), joined(&expected_err));
        prop_assert!(err.contents().matches('\n').count() >= expected_err.matches('\n').count());
        prop_assert_eq!(arb.pending_timers(), 0);
        prop_assert!(arb.interceptor().stream(StreamId::Stdout).buffered().is_empty());
        prop_assert!(arb.next_deadline().is_none());

        let renders = arb.stats().renders;
        let windows = elapsed / 100 + 1;
        prop_assert!(renders <= windows);
        if !notified {
            prop_assert_eq!(renders, 0);
        }
    }
}
