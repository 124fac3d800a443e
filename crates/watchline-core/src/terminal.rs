#![forbid(unsafe_code)]

//! Terminal detection and the few escape sequences the arbiter emits.
//!
//! Live rendering only makes sense when standard output is an interactive
//! terminal. Detection combines crossterm's [`IsTty`] with the usual
//! environment signals (`TERM=dumb`, `CI`, `NO_COLOR`).

use crossterm::tty::IsTty;

/// Clear the visible screen and scrollback, then home the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[3J\x1b[H";

/// Escape sequence that erases the `n` lines above the cursor and leaves the
/// cursor at column zero of the topmost erased line.
///
/// Assumes the cursor sits at the start of the line *after* the block, which
/// is where a newline-terminated draw leaves it.
#[must_use]
pub fn erase_lines(n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let mut out = String::with_capacity(n * 8 + 1);
    for _ in 0..n {
        out.push_str("\x1b[1A\x1b[2K");
    }
    out.push('\r');
    out
}

/// Snapshot of what the process is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalInfo {
    /// Standard output is a terminal.
    pub stdout_tty: bool,
    /// Standard error is a terminal.
    pub stderr_tty: bool,
    /// `TERM=dumb`.
    pub dumb: bool,
    /// Running under a CI system (`CI` set and not falsy).
    pub ci: bool,
    /// `NO_COLOR` set to any non-empty value.
    pub no_color: bool,
}

impl TerminalInfo {
    /// Detect from the real process streams and environment.
    #[must_use]
    pub fn detect() -> Self {
        let info = Self::from_env_with(
            |key| std::env::var(key).ok(),
            std::io::stdout().is_tty(),
            std::io::stderr().is_tty(),
        );
        crate::debug!(
            stdout_tty = info.stdout_tty,
            dumb = info.dumb,
            ci = info.ci,
            "terminal detected"
        );
        info
    }

    /// Detect using a custom environment lookup (for tests).
    #[must_use]
    pub fn from_env_with<F>(get_env: F, stdout_tty: bool, stderr_tty: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let dumb = get_env("TERM").is_some_and(|term| term.trim() == "dumb");
        let ci = get_env("CI").is_some_and(|value| parse_bool(&value) != Some(false));
        let no_color = get_env("NO_COLOR").is_some_and(|value| !value.is_empty());
        Self {
            stdout_tty,
            stderr_tty,
            dumb,
            ci,
            no_color,
        }
    }

    /// A fully interactive, color-capable terminal.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            stdout_tty: true,
            stderr_tty: true,
            dumb: false,
            ci: false,
            no_color: false,
        }
    }

    /// Piped output with no terminal attached.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            stdout_tty: false,
            stderr_tty: false,
            dumb: false,
            ci: false,
            no_color: true,
        }
    }

    /// Whether an in-place status display can be drawn.
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        self.stdout_tty && !self.dumb && !self.ci
    }

    /// Whether ANSI colors should be emitted.
    #[must_use]
    pub const fn color_enabled(&self) -> bool {
        self.stdout_tty && !self.dumb && !self.no_color
    }
}

/// Parse a boolean environment value.
///
/// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitive.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
