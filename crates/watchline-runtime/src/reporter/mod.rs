#![forbid(unsafe_code)]

//! Lifecycle hooks invoked by the test-runner driver.
//!
//! The driver owns collection and execution; it calls these hooks in the
//! order things happen and keeps a [`StateProvider`](crate::provider::StateProvider)
//! current. Every hook has a no-op default so partial reporters stay small.

mod base;
mod interactive;

pub use base::BaseReporter;
pub use interactive::{InteractiveReporter, ReporterBuilder};

use crate::model::{FileResult, TaskResultPack, TestError, UserConsoleLog};

/// Hook surface of a watch-mode reporter.
pub trait Reporter {
    /// Called once before the first run.
    fn on_init(&mut self) {}

    /// Test files of a run were discovered.
    fn on_paths_collected(&mut self, _paths: &[String]) {}

    /// A batch of task results arrived.
    fn on_task_update(&mut self, _packs: &[TaskResultPack]) {}

    /// The collected file snapshot changed.
    fn on_collected(&mut self) {}

    /// The run completed.
    fn on_finished(&mut self, _files: &[FileResult], _errors: &[TestError]) {}

    /// Watch mode is waiting for changes.
    fn on_watcher_start(&mut self, _files: &[FileResult], _errors: &[TestError]) {}

    /// A file change triggered a rerun of `files`.
    fn on_watcher_rerun(&mut self, _files: &[String], _trigger: Option<&str>) {}

    /// A test file was deleted.
    fn on_test_removed(&mut self, _trigger: Option<&str>) {}

    /// Test code wrote to the console.
    fn on_user_console_log(&mut self, _log: &UserConsoleLog) {}
}
