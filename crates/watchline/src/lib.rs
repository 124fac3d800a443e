#![forbid(unsafe_code)]

//! Watchline public facade crate.
//!
//! Re-exports the types a test-runner driver needs to wire a watch-mode
//! reporter: the reporter and its builder, the hook data model, config,
//! and the deterministic clock and capture sink used in tests.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use watchline_core::{
    Clock, DebounceScheduler, FlushPolicy, ManualClock, StreamId, SystemClock, TerminalInfo,
    TimerHandle, TimerQueue,
};

// --- Runtime re-exports ----------------------------------------------------

pub use watchline_runtime::{
    CaptureSink, ConfigError, DefaultSummary, FileResult, InteractiveReporter, LiveMode,
    LiveRenderer, Logger, MemoryState, OutputArbiter, Phase, PollReport, RenderError,
    RendererFactory, RendererOptions, Reporter, ReporterBuilder, ReporterConfig,
    StateProvider, StatusListRenderer, SummaryPresenter, TaskId, TaskResult, TaskResultPack,
    TaskState, TaskSummary, TestError, UserConsoleLog,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for watchline drivers.
#[derive(Debug)]
pub enum Error {
    /// I/O failure writing to a sink.
    Io(std::io::Error),
    /// A renderer failed.
    Render(RenderError),
    /// An environment override could not be parsed.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for watchline APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, FileResult, InteractiveReporter, LiveMode, Reporter, ReporterConfig, Result,
        StateProvider, StreamId, TaskResultPack, TaskState, UserConsoleLog,
    };

    pub use crate::{core, runtime};
}

pub use watchline_core as core;
pub use watchline_runtime as runtime;
