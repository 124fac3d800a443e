#![forbid(unsafe_code)]

//! Replays a [`Scenario`] against an [`InteractiveReporter`].
//!
//! The session behaves like a runner's event loop: between scenario steps
//! it sleeps until the reporter's next deadline and polls, so debounce
//! windows and flushes fire at the times they would in a real run.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use watchline_core::clock::{Clock, ManualClock};
use watchline_runtime::{
    InteractiveReporter, MemoryState, PollReport, Reporter, StateProvider, TaskId, TaskResult,
    TaskResultPack, TestError, UserConsoleLog,
};

use crate::scenario::{Action, ErrorSpec, Scenario, StreamSpec};

/// Idle time after the last step so trailing windows can fire.
const SETTLE: Duration = Duration::from_millis(250);

/// How the session waits.
pub trait Pace {
    fn now(&self) -> Instant;

    /// Block (or jump) until `deadline`.
    fn sleep_until(&self, deadline: Instant);
}

/// Wall-clock pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTime;

impl Pace for RealTime {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// Simulated pacing: sleeping advances the clock.
impl Pace for ManualClock {
    fn now(&self) -> Instant {
        Clock::now(self)
    }

    fn sleep_until(&self, deadline: Instant) {
        self.set(deadline);
    }
}

/// Totals over one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub steps: usize,
    pub polls: usize,
    pub flushes: usize,
    pub renders: usize,
    pub refreshes: usize,
    pub stale: usize,
}

impl RunStats {
    fn record(&mut self, report: PollReport) {
        self.polls += 1;
        self.flushes += report.flushes;
        self.renders += report.renders;
        self.refreshes += report.refreshes;
        self.stale += report.stale;
    }
}

fn test_error(spec: &ErrorSpec) -> TestError {
    TestError {
        stack: spec.stack.clone(),
        ..TestError::new(spec.name.as_str(), spec.message.as_str())
    }
}

fn scaled(at_ms: u64, speed: f64) -> Duration {
    Duration::from_secs_f64(at_ms as f64 / 1000.0 / speed)
}

/// A reporter plus the state it reads.
pub struct Session {
    reporter: InteractiveReporter,
    state: MemoryState,
    stats: RunStats,
}

impl Session {
    /// `state` must be the provider `reporter` was built with.
    #[must_use]
    pub fn new(reporter: InteractiveReporter, state: MemoryState) -> Self {
        Self {
            reporter,
            state,
            stats: RunStats::default(),
        }
    }

    #[must_use]
    pub fn reporter(&self) -> &InteractiveReporter {
        &self.reporter
    }

    #[must_use]
    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Feed one driver event to the state and the reporter.
    pub fn apply(&mut self, action: &Action) {
        match action {
            Action::Collect { files } => {
                self.state.clear_errors();
                for spec in files {
                    self.state.upsert_file(spec.to_file());
                }
                let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
                self.reporter.on_paths_collected(&paths);
                self.reporter.on_collected();
            }
            Action::Result {
                task,
                state,
                duration_ms,
                error,
            } => {
                let pack: TaskResultPack = (
                    TaskId::from(task.as_str()),
                    Some(TaskResult {
                        state: (*state).into(),
                        duration: duration_ms.map(Duration::from_millis),
                        errors: error.iter().map(test_error).collect(),
                    }),
                );
                if self.state.apply_packs(std::slice::from_ref(&pack)) == 0 {
                    debug!(task = task.as_str(), "result for unknown task");
                }
                self.reporter.on_task_update(&[pack]);
            }
            Action::Console {
                stream,
                content,
                task,
            } => {
                let log = match stream {
                    StreamSpec::Stdout => UserConsoleLog::stdout(content.as_str()),
                    StreamSpec::Stderr => UserConsoleLog::stderr(content.as_str()),
                };
                let log = match task {
                    Some(task) => match self.origin_of(task) {
                        Some(origin) => log.with_task(task.as_str()).with_origin(origin),
                        None => log.with_task(task.as_str()),
                    },
                    None => log,
                };
                self.reporter.on_user_console_log(&log);
            }
            Action::Error(spec) => self.state.push_error(test_error(spec)),
            Action::Finish => {
                let files = self.state.files(self.reporter.base().watch_filters());
                let errors = self.state.unhandled_errors();
                self.reporter.on_finished(&files, &errors);
                self.reporter.on_watcher_start(&files, &errors);
            }
            Action::Rerun { files, trigger } => {
                self.reporter.on_watcher_rerun(files, trigger.as_deref());
            }
            Action::Remove { path, trigger } => {
                self.state.remove_file(path);
                self.reporter.on_test_removed(trigger.as_deref());
            }
        }
    }

    /// `"<relative file> > <test name>"` for a task id.
    fn origin_of(&self, task: &str) -> Option<String> {
        self.state.files(None).iter().find_map(|file| {
            file.tasks
                .iter()
                .find(|t| t.id.as_str() == task)
                .map(|t| format!("{} > {}", self.reporter.base().relative(&file.path), t.name))
        })
    }

    fn poll(&mut self) {
        let report = self.reporter.poll();
        self.stats.record(report);
    }

    /// Poll every timer that comes due before `due`, then wait for `due`.
    fn wait_until<P: Pace>(&mut self, pace: &P, due: Instant) {
        loop {
            self.poll();
            match self.reporter.next_deadline() {
                Some(deadline) if deadline < due => pace.sleep_until(deadline),
                _ => {
                    pace.sleep_until(due);
                    self.poll();
                    return;
                }
            }
        }
    }

    /// Replay `scenario` at `speed`, then flush and stop the renderer.
    pub fn run<P: Pace>(&mut self, scenario: &Scenario, pace: &P, speed: f64) -> io::Result<RunStats> {
        let start = pace.now();
        info!(steps = scenario.steps.len(), speed, "replaying scenario");
        self.reporter.on_init();
        for (index, step) in scenario.steps.iter().enumerate() {
            self.wait_until(pace, start + scaled(step.at_ms, speed));
            debug!(index, at_ms = step.at_ms, action = ?step.action, "step");
            self.apply(&step.action);
            self.stats.steps += 1;
            self.poll();
        }
        let end = start + scaled(scenario.duration_ms(), speed) + SETTLE;
        self.wait_until(pace, end);
        self.reporter.shutdown()?;
        let stats = self.stats;
        info!(?stats, "scenario complete");
        Ok(stats)
    }
}
