#![forbid(unsafe_code)]

//! Per-stream buffering of raw writes.
//!
//! The interceptor owns the real output sinks and one [`OutputStream`]
//! record per stream. It decides *whether* a write flushes now or later;
//! the arbiter performs the flush because only it can erase and redraw the
//! status around the text.

use std::io::{self, Write};
use std::time::Instant;

use watchline_core::debounce::DebounceState;
use watchline_core::stream::{ChunkBuffer, FlushPolicy, StreamId};
use watchline_core::timer::{Schedule, TimerHandle};

/// Outcome of scheduling a flush after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Flush synchronously now.
    Immediate,
    /// A new window was opened.
    Scheduled(TimerHandle),
    /// Absorbed into a window that is already open.
    Absorbed,
}

/// Counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub writes: u64,
    pub bytes: u64,
    pub flushes: u64,
    pub write_errors: u64,
}

/// Buffer, pending timer, and real sink for one process stream.
pub struct OutputStream {
    id: StreamId,
    buffer: ChunkBuffer,
    pending: DebounceState,
    policy: FlushPolicy,
    sink: Box<dyn Write>,
    stats: StreamStats,
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("id", &self.id)
            .field("buffered", &self.buffer.len())
            .field("pending", &self.pending.is_scheduled())
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl OutputStream {
    fn new(id: StreamId, sink: Box<dyn Write>, policy: FlushPolicy) -> Self {
        Self {
            id,
            buffer: ChunkBuffer::new(),
            pending: DebounceState::new(),
            policy,
            sink,
            stats: StreamStats::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[must_use]
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    #[must_use]
    pub fn buffered(&self) -> &ChunkBuffer {
        &self.buffer
    }

    /// Whether a flush timer is pending.
    #[must_use]
    pub fn is_flush_pending(&self) -> bool {
        self.pending.is_scheduled()
    }

    #[must_use]
    pub fn stats(&self) -> StreamStats {
        self.stats
    }
}

/// Owner of both stream records.
#[derive(Debug)]
pub struct StreamInterceptor {
    stdout: OutputStream,
    stderr: OutputStream,
}

impl StreamInterceptor {
    /// Wrap the real sinks with the default policies: stderr immediate,
    /// stdout windowed.
    pub fn new(stdout: Box<dyn Write>, stderr: Box<dyn Write>, stdout_policy: FlushPolicy) -> Self {
        Self {
            stdout: OutputStream::new(StreamId::Stdout, stdout, stdout_policy),
            stderr: OutputStream::new(StreamId::Stderr, stderr, FlushPolicy::Immediate),
        }
    }

    /// Override one stream's policy.
    pub fn set_policy(&mut self, id: StreamId, policy: FlushPolicy) {
        self.stream_mut(id).policy = policy;
    }

    #[must_use]
    pub fn stream(&self, id: StreamId) -> &OutputStream {
        match id {
            StreamId::Stdout => &self.stdout,
            StreamId::Stderr => &self.stderr,
        }
    }

    fn stream_mut(&mut self, id: StreamId) -> &mut OutputStream {
        match id {
            StreamId::Stdout => &mut self.stdout,
            StreamId::Stderr => &mut self.stderr,
        }
    }

    /// The real sink of a stream.
    pub fn sink_mut(&mut self, id: StreamId) -> &mut dyn Write {
        &mut *self.stream_mut(id).sink
    }

    /// Append a chunk in call order.
    pub fn append(&mut self, id: StreamId, text: impl Into<String>) {
        let text = text.into();
        let stream = self.stream_mut(id);
        stream.stats.writes += 1;
        stream.stats.bytes += text.len() as u64;
        stream.buffer.push(text);
    }

    /// Decide when buffered text for `id` is flushed.
    ///
    /// Windowed streams arm at most one timer per window; `key` is what the
    /// timer carries back to the event loop.
    pub fn schedule_flush<K, S>(
        &mut self,
        id: StreamId,
        timers: &mut S,
        now: Instant,
        key: K,
    ) -> FlushDecision
    where
        S: Schedule<K>,
    {
        let stream = self.stream_mut(id);
        match stream.policy {
            FlushPolicy::Immediate => FlushDecision::Immediate,
            FlushPolicy::Windowed(window) => match stream.pending.arm(timers, now, window, key) {
                Some(handle) => FlushDecision::Scheduled(handle),
                None => FlushDecision::Absorbed,
            },
        }
    }

    /// Clear the pending flag if `handle` is this stream's live timer.
    pub fn flush_timer_fired(&mut self, id: StreamId, handle: TimerHandle) -> bool {
        self.stream_mut(id).pending.fired(handle)
    }

    /// Cancel a pending flush timer. Idempotent.
    pub fn cancel_flush<K, S>(&mut self, id: StreamId, timers: &mut S) -> bool
    where
        S: Schedule<K>,
    {
        self.stream_mut(id).pending.cancel(timers)
    }

    /// Drain the buffer of `id` in one step.
    pub fn take(&mut self, id: StreamId) -> String {
        self.stream_mut(id).buffer.take_joined()
    }

    /// Write `text` to the real sink and flush it.
    pub fn write_through(&mut self, id: StreamId, text: &str) -> io::Result<()> {
        let stream = self.stream_mut(id);
        stream.stats.flushes += 1;
        let result = stream
            .sink
            .write_all(text.as_bytes())
            .and_then(|()| stream.sink.flush());
        if result.is_err() {
            stream.stats.write_errors += 1;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSink;
    use std::time::Duration;
    use watchline_core::timer::TimerQueue;

    const WINDOW: Duration = Duration::from_millis(100);

    fn interceptor() -> (StreamInterceptor, CaptureSink, CaptureSink) {
        let out = CaptureSink::new();
        let err = CaptureSink::new();
        let i = StreamInterceptor::new(
            Box::new(out.clone()),
            Box::new(err.clone()),
            FlushPolicy::Windowed(WINDOW),
        );
        (i, out, err)
    }

    #[test]
    fn stderr_is_immediate() {
        let (mut i, _, _) = interceptor();
        let mut timers: TimerQueue<StreamId> = TimerQueue::new();
        i.append(StreamId::Stderr, "oops");
        let decision = i.schedule_flush(StreamId::Stderr, &mut timers, Instant::now(), StreamId::Stderr);
        assert_eq!(decision, FlushDecision::Immediate);
        assert!(timers.is_empty());
    }

    #[test]
    fn stdout_opens_one_window_per_burst() {
        let (mut i, _, _) = interceptor();
        let mut timers = TimerQueue::new();
        let now = Instant::now();

        let first = i.schedule_flush(StreamId::Stdout, &mut timers, now, StreamId::Stdout);
        let second = i.schedule_flush(StreamId::Stdout, &mut timers, now, StreamId::Stdout);
        assert!(matches!(first, FlushDecision::Scheduled(_)));
        assert_eq!(second, FlushDecision::Absorbed);
        assert_eq!(timers.len(), 1);
        assert!(i.stream(StreamId::Stdout).is_flush_pending());

        let (handle, _) = timers.pop_due(now + WINDOW).expect("due");
        assert!(i.flush_timer_fired(StreamId::Stdout, handle));
        assert!(!i.stream(StreamId::Stdout).is_flush_pending());
    }

    #[test]
    fn take_and_write_through() {
        let (mut i, out, _) = interceptor();
        i.append(StreamId::Stdout, "a");
        i.append(StreamId::Stdout, "b\n");
        let text = i.take(StreamId::Stdout);
        assert_eq!(text, "ab\n");
        assert!(i.stream(StreamId::Stdout).buffered().is_empty());

        i.write_through(StreamId::Stdout, &text).expect("write");
        assert_eq!(out.contents(), "ab\n");
        let stats = i.stream(StreamId::Stdout).stats();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.bytes, 3);
        assert_eq!(stats.flushes, 1);
    }

    #[test]
    fn cancel_flush_twice_is_noop() {
        let (mut i, _, _) = interceptor();
        let mut timers = TimerQueue::new();
        i.schedule_flush(StreamId::Stdout, &mut timers, Instant::now(), StreamId::Stdout);
        assert!(i.cancel_flush(StreamId::Stdout, &mut timers));
        assert!(!i.cancel_flush(StreamId::Stdout, &mut timers));
        assert!(timers.is_empty());
    }

    #[test]
    fn set_policy_switches_stdout_to_immediate() {
        let (mut i, _, _) = interceptor();
        let mut timers: TimerQueue<StreamId> = TimerQueue::new();
        i.set_policy(StreamId::Stdout, FlushPolicy::Immediate);
        assert_eq!(
            i.schedule_flush(StreamId::Stdout, &mut timers, Instant::now(), StreamId::Stdout),
            FlushDecision::Immediate
        );
    }
}
