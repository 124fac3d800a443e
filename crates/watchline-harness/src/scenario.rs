#![forbid(unsafe_code)]

//! Scenario files.
//!
//! ```json
//! {
//!   "root": "/project",
//!   "steps": [
//!     { "at_ms": 0, "event": "collect",
//!       "files": [{ "path": "/project/math.test.ts", "tests": ["adds"] }] },
//!     { "at_ms": 40, "event": "result", "task": "/project/math.test.ts#0", "state": "pass" },
//!     { "at_ms": 90, "event": "finish" }
//!   ]
//! }
//! ```
//!
//! Task ids are `<path>#<index>` in the order tests are listed.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use watchline_runtime::{FileResult, StreamId, TaskState, TaskSummary};

/// The scenario bundled with the binary.
pub const DEMO: &str = include_str!("../scenarios/demo.json");

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Root used to relativize triggers.
    #[serde(default)]
    pub root: Option<PathBuf>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Offset from session start, before speed scaling.
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Action {
    /// A run discovered these files.
    Collect { files: Vec<FileSpec> },
    /// One task finished.
    Result {
        task: String,
        state: StateSpec,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        error: Option<ErrorSpec>,
    },
    /// Test code wrote to the console.
    Console {
        #[serde(default)]
        stream: StreamSpec,
        content: String,
        #[serde(default)]
        task: Option<String>,
    },
    /// An error outside any test.
    Error(ErrorSpec),
    /// The run completed; watch mode starts waiting.
    Finish,
    /// A change triggered a rerun.
    Rerun {
        files: Vec<String>,
        #[serde(default)]
        trigger: Option<String>,
    },
    /// A test file was deleted.
    Remove {
        path: String,
        #[serde(default)]
        trigger: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSpec {
    pub path: String,
    pub tests: Vec<String>,
    /// Heap usage reported when the file finishes.
    #[serde(default)]
    pub heap_bytes: Option<u64>,
}

impl FileSpec {
    /// The file with every test pending.
    #[must_use]
    pub fn to_file(&self) -> FileResult {
        let tasks = self
            .tests
            .iter()
            .enumerate()
            .map(|(i, name)| TaskSummary::new(format!("{}#{i}", self.path), name.as_str()))
            .collect();
        let mut file = FileResult::new(self.path.as_str()).with_tasks(tasks);
        file.heap = self.heap_bytes;
        file
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSpec {
    Run,
    Pass,
    Fail,
    Skip,
    Todo,
}

impl From<StateSpec> for TaskState {
    fn from(state: StateSpec) -> Self {
        match state {
            StateSpec::Run => Self::Run,
            StateSpec::Pass => Self::Pass,
            StateSpec::Fail => Self::Fail,
            StateSpec::Skip => Self::Skip,
            StateSpec::Todo => Self::Todo,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSpec {
    #[default]
    Stdout,
    Stderr,
}

impl From<StreamSpec> for StreamId {
    fn from(stream: StreamSpec) -> Self {
        match stream {
            StreamSpec::Stdout => Self::Stdout,
            StreamSpec::Stderr => Self::Stderr,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorSpec {
    #[serde(default = "default_error_name")]
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

fn default_error_name() -> String {
    "Error".to_owned()
}

/// Failure to load a scenario.
#[derive(Debug)]
pub enum ScenarioError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// Steps are not sorted by `at_ms`.
    Unordered { index: usize },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read scenario: {e}"),
            Self::Parse(e) => write!(f, "invalid scenario: {e}"),
            Self::Unordered { index } => {
                write!(f, "step {index} is scheduled before the step preceding it")
            }
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Unordered { .. } => None,
        }
    }
}

impl From<io::Error> for ScenarioError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

impl Scenario {
    /// Parse and validate a scenario.
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_json::from_str(text)?;
        if let Some(index) = scenario
            .steps
            .windows(2)
            .position(|pair| pair[1].at_ms < pair[0].at_ms)
        {
            return Err(ScenarioError::Unordered { index: index + 1 });
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// The bundled demo.
    pub fn demo() -> Result<Self, ScenarioError> {
        Self::parse(DEMO)
    }

    /// Time of the last step.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.steps.last().map_or(0, |step| step.at_ms)
    }
}
