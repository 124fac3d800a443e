#![forbid(unsafe_code)]

//! Error types.

use std::fmt;
use std::io;

/// Failure while drawing or erasing the live status.
///
/// These never reach the raw writers: the coordinator logs and counts them.
#[derive(Debug)]
pub enum RenderError {
    /// The terminal sink rejected the write.
    Io(io::Error),
    /// The renderer could not produce a frame.
    Renderer(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "render I/O error: {e}"),
            Self::Renderer(msg) => write!(f, "renderer error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Renderer(_) => None,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Result alias for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// An environment override that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Environment variable name.
    pub key: &'static str,
    /// Offending value.
    pub value: String,
    /// What was expected.
    pub reason: &'static str,
}

impl ConfigError {
    pub(crate) fn new(key: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self {
            key,
            value: value.into(),
            reason,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.key, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}
