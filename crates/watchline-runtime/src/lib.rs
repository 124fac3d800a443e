#![forbid(unsafe_code)]

//! Watchline Runtime
//!
//! Output arbitration for watch-mode test runners. Raw writes from test
//! code and a redrawn status display share one terminal; this crate makes
//! sure they never interleave mid-frame.
//!
//! # Key Components
//!
//! - [`StreamInterceptor`] - Per-stream buffers with windowed or immediate flush
//! - [`RenderCoordinator`] - Mount/erase/redraw/stop sequencing for a [`LiveRenderer`]
//! - [`OutputArbiter`] - Single owner of the sinks; timers, backlog, flush contract
//! - [`Lifecycle`] - Run/rerun phase machine
//! - [`InteractiveReporter`] - Reporter hooks wired to the arbiter
//!
//! # How it fits in the system
//! `watchline-core` supplies time, timers and debounce state. This crate
//! composes them into the arbiter and the reporter. A driver (the test
//! runner, or `watchline-harness`) calls reporter hooks as events happen
//! and polls the reporter when idle.

pub mod arbiter;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod interceptor;
pub mod lifecycle;
pub mod model;
pub mod provider;
pub mod renderer;
pub mod reporter;
pub mod style;
pub mod summary;

pub use arbiter::{
    ArbiterOptions, ArbiterStats, InterceptedStream, OutputArbiter, PollReport, SharedArbiter,
    TimerKey,
};
pub use capture::CaptureSink;
pub use config::{LiveMode, ReporterConfig};
pub use coordinator::{CoordinatorStats, RenderCoordinator, RenderState};
pub use error::{ConfigError, RenderError, RenderResult};
pub use interceptor::{FlushDecision, OutputStream, StreamInterceptor, StreamStats};
pub use lifecycle::{Lifecycle, LifecycleEvent, Phase, Transition};
pub use model::{
    FileResult, TaskId, TaskResult, TaskResultPack, TaskState, TaskSummary, TestError,
    UserConsoleLog,
};
pub use provider::{Logger, MemoryState, StateProvider};
pub use renderer::{LiveRenderer, RendererFactory, RendererOptions, StatusListRenderer};
pub use reporter::{BaseReporter, InteractiveReporter, Reporter, ReporterBuilder};
pub use style::Palette;
pub use summary::{DefaultSummary, SummaryPresenter};

pub use watchline_core::{Clock, FlushPolicy, ManualClock, StreamId, SystemClock, TerminalInfo};
