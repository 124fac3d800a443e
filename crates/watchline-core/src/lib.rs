#![forbid(unsafe_code)]

//! Core: time, timers, debounce state, stream buffers, and terminal detection.
//!
//! Everything in this crate is single-threaded and deterministic. Time is
//! always passed in (or read from an injectable [`clock::Clock`]) so callers
//! can simulate debounce windows without sleeping.

pub mod clock;
pub mod debounce;
pub mod logging;
pub mod stream;
pub mod terminal;
pub mod timer;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, trace, warn};

pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::{DebounceScheduler, DebounceState, DebounceStats};
pub use stream::{ChunkBuffer, FlushPolicy, StreamId};
pub use terminal::TerminalInfo;
pub use timer::{Schedule, TimerHandle, TimerQueue};
