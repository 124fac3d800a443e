#![forbid(unsafe_code)]

//! Logging and tracing support.
//!
//! With the `tracing` feature the usual macros are re-exported from
//! `tracing`; without it, no-op macros with the same names keep call sites
//! compiling. The `tracing-json` feature adds [`init_subscriber`], which
//! installs a global subscriber writing to a log file. Diagnostics never go
//! to the terminal: the terminal belongs to the output arbiter.

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op debug macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op debug_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op trace macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op warn macro when tracing is disabled.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }
}

/// A no-op span for when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    /// Enter the no-op span (does nothing).
    pub fn enter(&self) -> NoopGuard {
        NoopGuard
    }
}

/// A no-op span guard.
#[cfg(not(feature = "tracing"))]
pub struct NoopGuard;

#[cfg(feature = "tracing-json")]
pub use subscriber::{LogFormat, LogInitError, init_subscriber};

#[cfg(feature = "tracing-json")]
mod subscriber {
    use std::fmt;
    use std::fs::OpenOptions;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;

    use tracing_subscriber::EnvFilter;

    /// Environment variable consulted before `RUST_LOG`.
    pub const LOG_ENV: &str = "WATCHLINE_LOG";

    /// Output format of the log file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum LogFormat {
        /// Human-readable lines.
        #[default]
        Text,
        /// One JSON object per event.
        Json,
    }

    /// Failure to install the global subscriber.
    #[derive(Debug)]
    pub enum LogInitError {
        /// The log file could not be opened.
        Io(io::Error),
        /// A global subscriber was already installed.
        AlreadyInstalled(String),
    }

    impl fmt::Display for LogInitError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Io(e) => write!(f, "cannot open log file: {e}"),
                Self::AlreadyInstalled(msg) => write!(f, "subscriber already installed: {msg}"),
            }
        }
    }

    impl std::error::Error for LogInitError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                Self::Io(e) => Some(e),
                Self::AlreadyInstalled(_) => None,
            }
        }
    }

    impl From<io::Error> for LogInitError {
        fn from(err: io::Error) -> Self {
            Self::Io(err)
        }
    }

    fn filter() -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install a global subscriber appending to `path`.
    ///
    /// The filter comes from `WATCHLINE_LOG`, then `RUST_LOG`, then `info`.
    pub fn init_subscriber(path: &Path, format: LogFormat) -> Result<(), LogInitError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = Mutex::new(file);
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_writer(writer);
        let result = match format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        result.map_err(|e| LogInitError::AlreadyInstalled(e.to_string()))
    }
}
