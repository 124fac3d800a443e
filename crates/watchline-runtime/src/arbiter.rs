#![forbid(unsafe_code)]

//! The output arbiter: single owner of the terminal.
//!
//! `OutputArbiter` composes the stream interceptor, the progress debounce,
//! the render coordinator, a timer queue, and a clock. Every byte that
//! reaches the real sinks passes through it, which is what guarantees the
//! flush contract:
//!
//! 1. erase the drawn status (if any),
//! 2. write the buffered text,
//! 3. redraw the status.
//!
//! # Event Loop
//!
//! Nothing here blocks or sleeps. Writes and progress notifications only
//! record state and arm timers; the driver calls [`OutputArbiter::poll`]
//! when idle and sleeps until [`OutputArbiter::next_deadline`]. Deferred
//! actions are [`TimerKey`] values, dispatched in deadline order.
//!
//! # Re-entrancy
//!
//! Test code writes through [`InterceptedStream`], which shares the arbiter
//! via `Rc<RefCell<_>>`. A write that arrives while the arbiter is busy
//! (from inside a sink or a renderer) is parked in a backlog and replayed,
//! in order, before the next arbiter operation completes. The write itself
//! always succeeds.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug_span, trace, warn};
use watchline_core::clock::Clock;
use watchline_core::debounce::{DebounceScheduler, DebounceState, DebounceStats};
use watchline_core::stream::{FlushPolicy, StreamId};
use watchline_core::terminal::CLEAR_SCREEN;
use watchline_core::timer::TimerQueue;

use crate::coordinator::{RenderCoordinator, RenderState};
use crate::interceptor::{FlushDecision, StreamInterceptor};
use crate::model::FileResult;
use crate::provider::Logger;
use crate::renderer::LiveRenderer;

/// A deferred action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKey {
    /// Flush the buffered text of a stream.
    Flush(StreamId),
    /// Coalesced progress redraw for the renderer of `generation`.
    Render { generation: u64 },
    /// Periodic self-refresh (spinner) for the renderer of `generation`.
    Refresh { generation: u64 },
}

/// What one `poll` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub flushes: usize,
    pub renders: usize,
    pub refreshes: usize,
    /// Timers that fired for a stopped or replaced renderer.
    pub stale: usize,
    /// Re-entrant writes replayed from the backlog.
    pub backlog: usize,
}

impl PollReport {
    /// True when the poll did nothing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Arbiter-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterStats {
    pub flush_errors: u64,
    pub backlog_writes: u64,
    pub stale_timers: u64,
    pub renders: u64,
    pub refreshes: u64,
}

/// Writes parked while the arbiter was busy.
pub type Backlog = Rc<RefCell<VecDeque<(StreamId, String)>>>;

/// Arbiter shared with [`InterceptedStream`] handles.
pub type SharedArbiter = Rc<RefCell<OutputArbiter>>;

/// Settings the arbiter needs at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterOptions {
    pub stdout_policy: FlushPolicy,
    pub render_window: Duration,
    /// Live rendering enabled (progress notifications are ignored otherwise).
    pub live: bool,
    /// Honor `clear_screen` requests.
    pub clear_screen: bool,
}

impl Default for ArbiterOptions {
    fn default() -> Self {
        Self {
            stdout_policy: FlushPolicy::Windowed(crate::config::DEFAULT_WINDOW),
            render_window: crate::config::DEFAULT_WINDOW,
            live: true,
            clear_screen: true,
        }
    }
}

/// Single owner of terminal output.
pub struct OutputArbiter {
    clock: Box<dyn Clock>,
    timers: TimerQueue<TimerKey>,
    interceptor: StreamInterceptor,
    debounce: DebounceScheduler,
    refresh: DebounceState,
    coordinator: RenderCoordinator,
    backlog: Backlog,
    clear_screen: bool,
    pending_clear: Option<String>,
    /// Stream whose last flushed text did not end in a newline.
    open_line: Option<StreamId>,
    stats: ArbiterStats,
}

impl std::fmt::Debug for OutputArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputArbiter")
            .field("timers", &self.timers.len())
            .field("interceptor", &self.interceptor)
            .field("coordinator", &self.coordinator)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl OutputArbiter {
    /// Create an arbiter over the real sinks.
    pub fn new(
        stdout: Box<dyn Write>,
        stderr: Box<dyn Write>,
        clock: Box<dyn Clock>,
        options: ArbiterOptions,
    ) -> Self {
        Self {
            clock,
            timers: TimerQueue::new(),
            interceptor: StreamInterceptor::new(stdout, stderr, options.stdout_policy),
            debounce: DebounceScheduler::new(options.render_window).with_enabled(options.live),
            refresh: DebounceState::new(),
            coordinator: RenderCoordinator::new(),
            backlog: Rc::new(RefCell::new(VecDeque::new())),
            clear_screen: options.clear_screen,
            pending_clear: None,
            open_line: None,
            stats: ArbiterStats::default(),
        }
    }

    /// Wrap for sharing with intercepted streams.
    #[must_use]
    pub fn into_shared(self) -> SharedArbiter {
        Rc::new(RefCell::new(self))
    }

    /// A `Write` handle that routes into `stream`'s buffer.
    #[must_use]
    pub fn intercept(shared: &SharedArbiter, stream: StreamId) -> InterceptedStream {
        let backlog = Rc::clone(&shared.borrow().backlog);
        InterceptedStream {
            arbiter: Rc::clone(shared),
            backlog,
            stream,
        }
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.debounce.is_enabled()
    }

    #[must_use]
    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn interceptor(&self) -> &StreamInterceptor {
        &self.interceptor
    }

    #[must_use]
    pub fn stats(&self) -> ArbiterStats {
        self.stats
    }

    #[must_use]
    pub fn debounce_stats(&self) -> DebounceStats {
        self.debounce.stats()
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// When the driver should poll next. A non-empty backlog is due now.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.backlog.borrow().is_empty() {
            return Some(self.clock.now());
        }
        self.timers.next_deadline()
    }

    /// How long the driver may sleep.
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    // --- raw writes ---------------------------------------------------------

    /// Accept a raw write. Never fails and never blocks.
    pub fn write(&mut self, stream: StreamId, text: impl Into<String>) {
        self.drain_backlog();
        self.write_inner(stream, text.into());
        self.drain_backlog();
    }

    fn write_inner(&mut self, stream: StreamId, text: String) {
        if text.is_empty() {
            return;
        }
        self.interceptor.append(stream, text);
        let now = self.clock.now();
        match self
            .interceptor
            .schedule_flush(stream, &mut self.timers, now, TimerKey::Flush(stream))
        {
            FlushDecision::Immediate => {
                if let Err(err) = self.flush_stream(stream) {
                    warn!(%stream, error = %err, "immediate flush failed");
                }
            }
            FlushDecision::Scheduled(handle) => {
                trace!(%stream, timer = handle.id(), "flush scheduled");
            }
            FlushDecision::Absorbed => {}
        }
    }

    /// Flush one stream now: erase status, write buffered text, redraw.
    ///
    /// Runs even when nothing is buffered (acts as a status refresh). The
    /// buffer is drained before writing, so a failed write is not replayed.
    pub fn flush(&mut self, stream: StreamId) -> io::Result<()> {
        self.drain_backlog();
        let result = self.flush_stream(stream);
        self.drain_backlog();
        result
    }

    /// Flush stderr then stdout, cancelling their timers. Empty streams are
    /// skipped. Returns the first write error.
    pub fn flush_all(&mut self) -> io::Result<()> {
        self.drain_backlog();
        let mut first_err = None;
        for stream in StreamId::ALL {
            self.interceptor.cancel_flush(stream, &mut self.timers);
            if self.interceptor.stream(stream).buffered().is_empty() {
                continue;
            }
            if let Err(err) = self.flush_stream(stream)
                && first_err.is_none()
            {
                first_err = Some(err);
            }
        }
        self.drain_backlog();
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn flush_stream(&mut self, stream: StreamId) -> io::Result<()> {
        let _span = debug_span!("watchline.flush", %stream).entered();
        self.interceptor.cancel_flush(stream, &mut self.timers);
        let text = self.interceptor.take(stream);
        self.coordinator
            .erase(self.interceptor.sink_mut(StreamId::Stdout));
        let result = if text.is_empty() {
            Ok(())
        } else {
            self.interceptor.write_through(stream, &text)
        };
        match &result {
            Ok(()) if !text.is_empty() => {
                self.open_line = (!text.ends_with('\n')).then_some(stream);
            }
            Ok(()) => {}
            Err(err) => {
                self.stats.flush_errors += 1;
                warn!(%stream, bytes = text.len(), error = %err, "sink write failed");
            }
        }
        self.draw_status();
        result
    }

    /// Redraw the status. A line left open by raw text is ended first, so
    /// the frame (and the erase that later removes it) never shares a row
    /// with that text.
    fn draw_status(&mut self) -> bool {
        if self.coordinator.state() == RenderState::MountedIdle
            && let Some(stream) = self.open_line.take()
        {
            let sink = self.interceptor.sink_mut(stream);
            if let Err(err) = sink.write_all(b"\n").and_then(|()| sink.flush()) {
                warn!(%stream, error = %err, "line break before status failed");
            }
        }
        self.coordinator
            .redraw(self.interceptor.sink_mut(StreamId::Stdout))
    }

    fn pop_backlog(&self) -> Option<(StreamId, String)> {
        self.backlog.borrow_mut().pop_front()
    }

    fn drain_backlog(&mut self) -> usize {
        let mut drained = 0;
        while let Some((stream, text)) = self.pop_backlog() {
            drained += 1;
            self.stats.backlog_writes += 1;
            self.write_inner(stream, text);
        }
        drained
    }

    // --- live status --------------------------------------------------------

    /// Record a progress event. At most one redraw per render window.
    pub fn notify_progress(&mut self) -> bool {
        let generation = self.coordinator.generation();
        let now = self.clock.now();
        self.debounce
            .notify(&mut self.timers, now, TimerKey::Render { generation })
    }

    /// Mount a renderer, stopping (and invalidating the timers of) any
    /// previous one. Returns the new generation.
    pub fn mount(&mut self, renderer: Box<dyn LiveRenderer>) -> u64 {
        self.stop_renderer();
        let generation = self.coordinator.mount(renderer);
        self.ensure_refresh();
        generation
    }

    /// Replace the renderer model without drawing.
    pub fn update(&mut self, files: Vec<FileResult>) {
        self.coordinator.update(files);
        self.ensure_refresh();
    }

    /// Erase drawn status lines.
    pub fn erase(&mut self) {
        self.drain_backlog();
        self.coordinator
            .erase(self.interceptor.sink_mut(StreamId::Stdout));
    }

    /// Draw the current status now.
    pub fn redraw(&mut self) -> bool {
        self.drain_backlog();
        let drawn = self.draw_status();
        self.drain_backlog();
        drawn
    }

    /// Stop the renderer and cancel every timer it owns. Idempotent.
    pub fn stop_renderer(&mut self) -> bool {
        self.debounce.cancel(&mut self.timers);
        self.refresh.cancel(&mut self.timers);
        self.coordinator.stop()
    }

    /// Flush everything and stop the renderer, leaving no timers behind.
    pub fn settle(&mut self) -> io::Result<()> {
        let result = self.flush_all();
        self.stop_renderer();
        result
    }

    fn ensure_refresh(&mut self) {
        if self.refresh.is_scheduled() {
            return;
        }
        let Some(interval) = self.coordinator.refresh_interval() else {
            return;
        };
        let generation = self.coordinator.generation();
        let now = self.clock.now();
        self.refresh
            .arm(&mut self.timers, now, interval, TimerKey::Refresh { generation });
    }

    // --- event loop ---------------------------------------------------------

    /// Run every timer due at the clock's current time.
    pub fn poll(&mut self) -> PollReport {
        let now = self.clock.now();
        self.poll_at(now)
    }

    /// Run every timer due at `now`, in deadline order.
    pub fn poll_at(&mut self, now: Instant) -> PollReport {
        let mut report = PollReport {
            backlog: self.drain_backlog(),
            ..PollReport::default()
        };
        while let Some((handle, key)) = self.timers.pop_due(now) {
            match key {
                TimerKey::Flush(stream) => {
                    if !self.interceptor.flush_timer_fired(stream, handle) {
                        report.stale += 1;
                        continue;
                    }
                    if let Err(err) = self.flush_stream(stream) {
                        warn!(%stream, error = %err, "scheduled flush failed");
                    }
                    report.flushes += 1;
                }
                TimerKey::Render { generation } => {
                    let live = self.debounce.fired(handle);
                    if !live || !self.coordinator.is_current(generation) {
                        report.stale += 1;
                        continue;
                    }
                    let _span = debug_span!("watchline.render", generation).entered();
                    if self.draw_status() {
                        report.renders += 1;
                        self.stats.renders += 1;
                    }
                    self.ensure_refresh();
                }
                TimerKey::Refresh { generation } => {
                    let live = self.refresh.fired(handle);
                    if !live || !self.coordinator.is_current(generation) {
                        report.stale += 1;
                        continue;
                    }
                    self.coordinator.tick();
                    self.draw_status();
                    report.refreshes += 1;
                    self.stats.refreshes += 1;
                    self.ensure_refresh();
                }
            }
            report.backlog += self.drain_backlog();
        }
        self.stats.stale_timers += report.stale as u64;
        report
    }

    /// Write one line. A pending clear always goes to stdout, ahead of
    /// the line even when the line itself is for stderr.
    fn emit_line(&mut self, stream: StreamId, text: &str) {
        if let Some(message) = self.pending_clear.take() {
            self.write(StreamId::Stdout, format!("{CLEAR_SCREEN}{message}\n"));
            if stream == StreamId::Stderr
                && let Err(err) = self.flush(StreamId::Stdout)
            {
                warn!(error = %err, "pending clear failed");
            }
        }
        self.write(stream, format!("{text}\n"));
    }
}

impl Logger for OutputArbiter {
    fn log(&mut self, text: &str) {
        self.emit_line(StreamId::Stdout, text);
    }

    fn error(&mut self, text: &str) {
        self.emit_line(StreamId::Stderr, text);
    }

    fn clear_screen(&mut self, message: &str, force: bool) {
        if !self.clear_screen {
            self.log(message);
            return;
        }
        self.pending_clear = Some(message.to_owned());
        if !force {
            return;
        }
        if let Some(message) = self.pending_clear.take() {
            self.write(StreamId::Stdout, format!("{CLEAR_SCREEN}{message}\n"));
        }
        if let Err(err) = self.flush(StreamId::Stdout) {
            warn!(error = %err, "forced clear failed");
        }
    }
}

/// `io::Write` handle for test code. Every write succeeds immediately.
///
/// Bytes are decoded lossily. `flush` is a no-op: timing belongs to the
/// arbiter.
pub struct InterceptedStream {
    arbiter: SharedArbiter,
    backlog: Backlog,
    stream: StreamId,
}

impl std::fmt::Debug for InterceptedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedStream")
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl InterceptedStream {
    #[must_use]
    pub fn stream(&self) -> StreamId {
        self.stream
    }
}

impl Write for InterceptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf).into_owned();
        match self.arbiter.try_borrow_mut() {
            Ok(mut arbiter) => arbiter.write(self.stream, text),
            Err(_) => self.backlog.borrow_mut().push_back((self.stream, text)),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
