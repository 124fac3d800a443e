#![forbid(unsafe_code)]

//! Reporter with a live status display.
//!
//! `InteractiveReporter` decorates [`BaseReporter`] with the output arbiter:
//! it mounts a renderer when a run collects its files, coalesces progress
//! into debounced redraws, erases the status before console output, and
//! commits the final frame before the summary.
//!
//! # Hook Sequencing
//!
//! | Hook | Output effect |
//! |---|---|
//! | `on_paths_collected` | new run: erase and stop any previous renderer, mount; mid-run: update |
//! | `on_collected` | update the model, schedule a redraw |
//! | `on_task_update` | update the model, schedule a redraw |
//! | `on_user_console_log` | erase status, then write header and content |
//! | `on_finished` | flush, draw final frame, stop renderer, summary, flush |
//! | `on_watcher_rerun` | draw final frame, stop renderer, clear and rerun notice, flush |
//! | `on_test_removed` | forced clear, final frame, summary, watch message |
//! | `on_watcher_start` | watch message, flush |
//!
//! Live output is disabled when stdout is not an interactive terminal
//! (unless forced by config). Console logs, summaries and notices still go
//! through the buffered path.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use watchline_core::clock::{Clock, SystemClock};
use watchline_core::stream::StreamId;
use watchline_core::terminal::TerminalInfo;

use super::{BaseReporter, Reporter};
use crate::arbiter::{ArbiterOptions, InterceptedStream, OutputArbiter, PollReport, SharedArbiter};
use crate::config::ReporterConfig;
use crate::lifecycle::{Lifecycle, LifecycleEvent, Phase};
use crate::model::{FileResult, TaskResultPack, TestError, UserConsoleLog};
use crate::provider::{Logger, MemoryState, StateProvider};
use crate::renderer::{RendererFactory, RendererOptions, StatusListRenderer};
use crate::style::Palette;
use crate::summary::{DefaultSummary, SummaryPresenter};

/// Assembles an [`InteractiveReporter`]. Every part has a production default.
pub struct ReporterBuilder {
    config: ReporterConfig,
    stdout: Option<Box<dyn Write>>,
    stderr: Option<Box<dyn Write>>,
    clock: Option<Box<dyn Clock>>,
    state: Option<Box<dyn StateProvider>>,
    factory: Option<Box<dyn RendererFactory>>,
    summary: Option<Box<dyn SummaryPresenter>>,
    terminal: Option<TerminalInfo>,
}

impl Default for ReporterBuilder {
    fn default() -> Self {
        Self::new(ReporterConfig::default())
    }
}

impl ReporterBuilder {
    #[must_use]
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            stdout: None,
            stderr: None,
            clock: None,
            state: None,
            factory: None,
            summary: None,
            terminal: None,
        }
    }

    #[must_use]
    pub fn stdout(mut self, sink: impl Write + 'static) -> Self {
        self.stdout = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn stderr(mut self, sink: impl Write + 'static) -> Self {
        self.stderr = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    #[must_use]
    pub fn state(mut self, state: impl StateProvider + 'static) -> Self {
        self.state = Some(Box::new(state));
        self
    }

    #[must_use]
    pub fn renderer_factory(mut self, factory: impl RendererFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl SummaryPresenter + 'static) -> Self {
        self.summary = Some(Box::new(summary));
        self
    }

    /// Skip detection and use `terminal`.
    #[must_use]
    pub fn terminal(mut self, terminal: TerminalInfo) -> Self {
        self.terminal = Some(terminal);
        self
    }

    #[must_use]
    pub fn build(self) -> InteractiveReporter {
        let terminal = self.terminal.unwrap_or_else(TerminalInfo::detect);
        let config = self.config;
        let live = config.live.enabled_for(&terminal);
        let color = config.color_for(&terminal);

        let arbiter = OutputArbiter::new(
            self.stdout.unwrap_or_else(|| Box::new(io::stdout())),
            self.stderr.unwrap_or_else(|| Box::new(io::stderr())),
            self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            ArbiterOptions {
                stdout_policy: config.flush_policy(StreamId::Stdout),
                render_window: config.render_window,
                live,
                clear_screen: config.clear_screen,
            },
        )
        .into_shared();

        let options = RendererOptions {
            render_succeed: config.render_succeed.unwrap_or(false),
            show_heap: config.log_heap_usage,
            color,
            width: None,
        };
        debug!(live, color, ?terminal, "reporter built");

        InteractiveReporter {
            base: BaseReporter::new(
                config,
                self.summary.unwrap_or_else(|| Box::new(DefaultSummary)),
                Palette::new(color),
                live,
            ),
            arbiter,
            state: self.state.unwrap_or_else(|| Box::new(MemoryState::new())),
            factory: self
                .factory
                .unwrap_or_else(|| Box::new(StatusListRenderer::factory())),
            lifecycle: Lifecycle::new(),
            live,
            options,
            render_succeed_default: None,
        }
    }
}

/// Watch-mode reporter with a live status display.
pub struct InteractiveReporter {
    base: BaseReporter,
    arbiter: SharedArbiter,
    state: Box<dyn StateProvider>,
    factory: Box<dyn RendererFactory>,
    lifecycle: Lifecycle,
    live: bool,
    options: RendererOptions,
    render_succeed_default: Option<bool>,
}

impl std::fmt::Debug for InteractiveReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveReporter")
            .field("base", &self.base)
            .field("lifecycle", &self.lifecycle)
            .field("live", &self.live)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl InteractiveReporter {
    /// Builder with the given configuration.
    #[must_use]
    pub fn builder(config: ReporterConfig) -> ReporterBuilder {
        ReporterBuilder::new(config)
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn base(&self) -> &BaseReporter {
        &self.base
    }

    /// Options the next renderer will be created with.
    #[must_use]
    pub fn render_options(&self) -> RendererOptions {
        self.options
    }

    /// Shared handle to the arbiter (stats, direct writes).
    #[must_use]
    pub fn arbiter(&self) -> SharedArbiter {
        SharedArbiter::clone(&self.arbiter)
    }

    /// `io::Write` for test code targeting `stream`.
    #[must_use]
    pub fn intercept(&self, stream: StreamId) -> InterceptedStream {
        OutputArbiter::intercept(&self.arbiter, stream)
    }

    /// Run due timers. Call whenever the driver is idle.
    pub fn poll(&mut self) -> PollReport {
        self.arbiter.borrow_mut().poll()
    }

    /// Run timers due at `now`.
    pub fn poll_at(&mut self, now: Instant) -> PollReport {
        self.arbiter.borrow_mut().poll_at(now)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.arbiter.borrow().next_deadline()
    }

    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        self.arbiter.borrow().time_until_next()
    }

    /// Flush everything and stop the renderer.
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.arbiter.borrow_mut().settle()
    }

    fn current_files(&self) -> Vec<FileResult> {
        self.state.files(self.base.watch_filters())
    }

    fn now(&self) -> Instant {
        self.arbiter.borrow().now()
    }

    /// Draw the final frame of the mounted renderer and stop it.
    fn commit_frame(arbiter: &mut OutputArbiter, files: Option<Vec<FileResult>>) {
        if !arbiter.coordinator().is_mounted() {
            return;
        }
        if let Some(files) = files {
            arbiter.update(files);
        }
        arbiter.redraw();
        arbiter.stop_renderer();
    }

    fn flush_all(arbiter: &mut OutputArbiter) {
        if let Err(err) = arbiter.flush_all() {
            warn!(error = %err, "flush failed");
        }
    }
}

impl Reporter for InteractiveReporter {
    fn on_init(&mut self) {
        let now = self.now();
        self.base.mark_start(now);
        debug!(live = self.live, "reporter initialized");
    }

    fn on_paths_collected(&mut self, paths: &[String]) {
        let new_run = self
            .lifecycle
            .apply(LifecycleEvent::PathsCollected)
            .starts_run();
        if new_run {
            let now = self.now();
            self.base.mark_start(now);
        }
        if !self.live {
            return;
        }

        let default = *self
            .render_succeed_default
            .get_or_insert(self.base.config().render_succeed == Some(true));
        if !default {
            self.options.render_succeed = paths.len() <= 1;
        }

        let files = self.current_files();
        let mut arbiter = self.arbiter.borrow_mut();
        if arbiter.coordinator().is_mounted() && !new_run {
            arbiter.update(files);
        } else {
            // A frame that was not committed must not stay behind the new one.
            arbiter.erase();
            arbiter.stop_renderer();
            let renderer = self.factory.create(files, self.options);
            let generation = arbiter.mount(renderer);
            debug!(generation, paths = paths.len(), "run started");
        }
    }

    fn on_task_update(&mut self, packs: &[TaskResultPack]) {
        self.lifecycle.apply(LifecycleEvent::TaskUpdated);
        trace!(packs = packs.len(), "task update");
        if !self.live {
            return;
        }
        let files = self.current_files();
        let mut arbiter = self.arbiter.borrow_mut();
        arbiter.update(files);
        arbiter.notify_progress();
    }

    fn on_collected(&mut self) {
        self.lifecycle.apply(LifecycleEvent::Collected);
        if !self.live {
            return;
        }
        let files = self.current_files();
        let mut arbiter = self.arbiter.borrow_mut();
        arbiter.update(files);
        arbiter.notify_progress();
    }

    fn on_finished(&mut self, files: &[FileResult], errors: &[TestError]) {
        self.lifecycle.apply(LifecycleEvent::Finished);
        let mut arbiter = self.arbiter.borrow_mut();
        Self::flush_all(&mut arbiter);
        Self::commit_frame(&mut arbiter, Some(files.to_vec()));
        arbiter.log("");
        let now = arbiter.now();
        self.base.on_finished(&mut *arbiter, files, errors, now);
        Self::flush_all(&mut arbiter);
    }

    fn on_watcher_start(&mut self, files: &[FileResult], errors: &[TestError]) {
        self.lifecycle.apply(LifecycleEvent::WatcherStart);
        let mut arbiter = self.arbiter.borrow_mut();
        self.base.on_watcher_start(&mut *arbiter, files, errors);
        Self::flush_all(&mut arbiter);
    }

    fn on_watcher_rerun(&mut self, files: &[String], trigger: Option<&str>) {
        self.lifecycle.apply(LifecycleEvent::WatcherRerun);
        {
            let mut arbiter = self.arbiter.borrow_mut();
            Self::flush_all(&mut arbiter);
            Self::commit_frame(&mut arbiter, None);
            self.base.on_watcher_rerun(&mut *arbiter, files, trigger);
            Self::flush_all(&mut arbiter);
        }
        if self.lifecycle.apply(LifecycleEvent::RerunNoticed).entered_collecting() {
            let now = self.now();
            self.base.mark_start(now);
        }
        debug!(files = files.len(), trigger, "rerun");
    }

    fn on_test_removed(&mut self, trigger: Option<&str>) {
        self.lifecycle.apply(LifecycleEvent::TestRemoved);
        let p = self.base.palette();
        let mut message = p.yellow("Test removed...");
        if let Some(trigger) = trigger {
            message.push_str(&p.dim(&format!(" [ {} ]", self.base.relative(trigger))));
        }
        let files = self.current_files();
        let errors = self.state.unhandled_errors();
        {
            let mut arbiter = self.arbiter.borrow_mut();
            arbiter.clear_screen(&message, true);
            Self::commit_frame(&mut arbiter, Some(files.clone()));
            arbiter.log("");
            let now = arbiter.now();
            self.base.report_summary(&mut *arbiter, &files, &errors, now);
        }
        self.on_watcher_start(&files, &errors);
    }

    fn on_user_console_log(&mut self, log: &UserConsoleLog) {
        if !self.base.should_log(log) {
            trace!(stream = %log.stream, "console log filtered");
            return;
        }
        let mut arbiter = self.arbiter.borrow_mut();
        arbiter.erase();
        self.base.on_user_console_log(&mut *arbiter, log);
    }
}
