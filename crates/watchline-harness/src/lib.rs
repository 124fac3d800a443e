#![forbid(unsafe_code)]

//! Scripted watch sessions for exercising the reporter end to end.
//!
//! A [`scenario::Scenario`] is a list of timed driver events (collect,
//! task results, console output, finish, rerun, removal). The
//! [`driver::Session`] replays it against an
//! [`InteractiveReporter`](watchline_runtime::InteractiveReporter), polling
//! the reporter between events the way a real runner's event loop would.

pub mod cli;
pub mod driver;
pub mod scenario;
