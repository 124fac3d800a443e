#![forbid(unsafe_code)]

//! Test-run data as seen by the reporter.
//!
//! These types are produced by the external driver (collection and
//! execution). The arbiter never inspects them; only renderers and summary
//! presenters do.

use std::fmt;
use std::time::Duration;

use watchline_core::StreamId;

/// Identifier of one task (test, suite, or file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub String);

impl TaskId {
    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    /// Collected, not yet queued.
    #[default]
    Pending,
    /// Waiting for a worker.
    Queued,
    /// Executing.
    Run,
    /// Passed.
    Pass,
    /// Failed.
    Fail,
    /// Skipped.
    Skip,
    /// Marked as todo.
    Todo,
}

impl TaskState {
    /// Whether the task reached a terminal state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Pass | Self::Fail | Self::Skip | Self::Todo)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Run => "run",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Todo => "todo",
        }
    }
}

/// A failure attached to a task or reported as unhandled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError {
    /// Error class name (`AssertionError`, `TypeError`, ...).
    pub name: String,
    /// Message.
    pub message: String,
    /// Stack trace, when the runner captured one.
    pub stack: Option<String>,
}

impl TestError {
    /// Error with a name and message and no stack.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Result carried by a task update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskResult {
    pub state: TaskState,
    pub duration: Option<Duration>,
    pub errors: Vec<TestError>,
}

/// One entry of a task-update batch. `None` means "state unknown yet".
pub type TaskResultPack = (TaskId, Option<TaskResult>);

/// A task inside a file, as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    pub duration: Option<Duration>,
    pub errors: Vec<TestError>,
}

impl TaskSummary {
    /// A pending task.
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: TaskState::Pending,
            duration: None,
            errors: Vec::new(),
        }
    }

    /// Apply a task result in place.
    pub fn apply(&mut self, result: &TaskResult) {
        self.state = result.state;
        self.duration = result.duration;
        self.errors.clone_from(&result.errors);
    }
}

/// Aggregate state of one test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    /// Path relative to the project root.
    pub path: String,
    pub state: TaskState,
    pub tasks: Vec<TaskSummary>,
    pub collect_duration: Option<Duration>,
    /// Heap in bytes after the file ran, when the runner measured it.
    pub heap: Option<u64>,
}

impl FileResult {
    /// A freshly collected file with no tasks yet.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: TaskState::Pending,
            tasks: Vec::new(),
            collect_duration: None,
            heap: None,
        }
    }

    /// Builder-style task list.
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<TaskSummary>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskSummary> {
        self.tasks.iter().filter(|t| t.state == TaskState::Fail)
    }

    pub fn passed_tasks(&self) -> impl Iterator<Item = &TaskSummary> {
        self.tasks.iter().filter(|t| t.state == TaskState::Pass)
    }

    /// Number of tasks in a terminal state.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state.is_finished()).count()
    }

    /// Recompute the file state from its tasks.
    ///
    /// Any failure fails the file; a file is finished only when every task
    /// is; any running or finished task makes it running.
    pub fn refresh_state(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let any_fail = self.tasks.iter().any(|t| t.state == TaskState::Fail);
        let all_done = self.tasks.iter().all(|t| t.state.is_finished());
        let any_started = self
            .tasks
            .iter()
            .any(|t| t.state == TaskState::Run || t.state.is_finished());
        self.state = if all_done {
            if any_fail {
                TaskState::Fail
            } else if self.tasks.iter().all(|t| t.state == TaskState::Skip) {
                TaskState::Skip
            } else {
                TaskState::Pass
            }
        } else if any_started {
            TaskState::Run
        } else {
            TaskState::Queued
        };
    }
}

/// Output captured from test code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserConsoleLog {
    pub content: String,
    pub stream: StreamId,
    /// Task that produced the output, if known.
    pub task_id: Option<TaskId>,
    /// Human-readable origin (file and test name) for the header line.
    pub origin: Option<String>,
}

impl UserConsoleLog {
    /// A stdout log with no origin.
    pub fn stdout(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stream: StreamId::Stdout,
            task_id: None,
            origin: None,
        }
    }

    /// A stderr log with no origin.
    pub fn stderr(content: impl Into<String>) -> Self {
        Self {
            stream: StreamId::Stderr,
            ..Self::stdout(content)
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_task(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
