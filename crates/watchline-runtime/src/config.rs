#![forbid(unsafe_code)]

//! Reporter configuration.
//!
//! Defaults come from [`ReporterConfig::default`]; builders override single
//! fields; [`ReporterConfig::from_env`] layers `WATCHLINE_*` environment
//! overrides on top.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `WATCHLINE_STDOUT_WINDOW_MS` | stdout coalescing window (0 = flush every write) |
//! | `WATCHLINE_RENDER_WINDOW_MS` | progress redraw window |
//! | `WATCHLINE_LIVE` | `auto`, `always`, or `never` |
//! | `WATCHLINE_CLEAR_SCREEN` | clear the screen on rerun |
//! | `WATCHLINE_RENDER_SUCCEED` | list passing tests |
//! | `WATCHLINE_LOG_HEAP` | show heap usage per file |
//! | `NO_COLOR` | disable ANSI colors |

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use watchline_core::StreamId;
use watchline_core::stream::FlushPolicy;
use watchline_core::terminal::{TerminalInfo, parse_bool};

use crate::error::ConfigError;

pub const ENV_STDOUT_WINDOW_MS: &str = "WATCHLINE_STDOUT_WINDOW_MS";
pub const ENV_RENDER_WINDOW_MS: &str = "WATCHLINE_RENDER_WINDOW_MS";
pub const ENV_LIVE: &str = "WATCHLINE_LIVE";
pub const ENV_CLEAR_SCREEN: &str = "WATCHLINE_CLEAR_SCREEN";
pub const ENV_RENDER_SUCCEED: &str = "WATCHLINE_RENDER_SUCCEED";
pub const ENV_LOG_HEAP: &str = "WATCHLINE_LOG_HEAP";
pub const ENV_NO_COLOR: &str = "NO_COLOR";

/// Default coalescing window for stdout and for progress redraws.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

/// Whether the live status display is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveMode {
    /// Only when stdout is an interactive terminal.
    #[default]
    Auto,
    /// Even when output is piped.
    Always,
    /// Never.
    Never,
}

impl LiveMode {
    /// Parse `auto`, `always`, or `never` (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "always" | "on" => Some(Self::Always),
            "never" | "off" => Some(Self::Never),
            _ => None,
        }
    }

    /// Resolve against the detected terminal.
    #[must_use]
    pub const fn enabled_for(self, terminal: &TerminalInfo) -> bool {
        match self {
            Self::Auto => terminal.is_interactive(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// User callback deciding whether a console log is shown.
pub type ConsoleLogFilter = Rc<dyn Fn(&str, StreamId) -> bool>;

/// Reporter configuration.
#[derive(Clone)]
pub struct ReporterConfig {
    pub stdout_window: Duration,
    pub render_window: Duration,
    pub live: LiveMode,
    /// Clear the screen when a rerun starts.
    pub clear_screen: bool,
    /// `None` means "decide from the number of collected files".
    pub render_succeed: Option<bool>,
    pub log_heap_usage: bool,
    /// `None` means "follow the terminal".
    pub color: Option<bool>,
    /// Project root, used to shorten trigger paths.
    pub root: PathBuf,
    pub console_log_filter: Option<ConsoleLogFilter>,
}

impl fmt::Debug for ReporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterConfig")
            .field("stdout_window", &self.stdout_window)
            .field("render_window", &self.render_window)
            .field("live", &self.live)
            .field("clear_screen", &self.clear_screen)
            .field("render_succeed", &self.render_succeed)
            .field("log_heap_usage", &self.log_heap_usage)
            .field("color", &self.color)
            .field("root", &self.root)
            .field("console_log_filter", &self.console_log_filter.is_some())
            .finish()
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            stdout_window: DEFAULT_WINDOW,
            render_window: DEFAULT_WINDOW,
            live: LiveMode::Auto,
            clear_screen: true,
            render_succeed: None,
            log_heap_usage: false,
            color: None,
            root: std::env::current_dir().unwrap_or_default(),
            console_log_filter: None,
        }
    }
}

impl ReporterConfig {
    #[must_use]
    pub fn with_stdout_window(mut self, window: Duration) -> Self {
        self.stdout_window = window;
        self
    }

    #[must_use]
    pub fn with_render_window(mut self, window: Duration) -> Self {
        self.render_window = window;
        self
    }

    #[must_use]
    pub fn with_live(mut self, live: LiveMode) -> Self {
        self.live = live;
        self
    }

    #[must_use]
    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    #[must_use]
    pub fn with_render_succeed(mut self, render_succeed: bool) -> Self {
        self.render_succeed = Some(render_succeed);
        self
    }

    #[must_use]
    pub fn with_log_heap_usage(mut self, enabled: bool) -> Self {
        self.log_heap_usage = enabled;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Install a console log filter. Returning `false` drops the log.
    #[must_use]
    pub fn with_console_log_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str, StreamId) -> bool + 'static,
    {
        self.console_log_filter = Some(Rc::new(filter));
        self
    }

    /// Defaults plus process environment overrides. Invalid values are
    /// logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults plus overrides from a custom lookup. Invalid values are
    /// logged and ignored.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for err in config.apply_env(&get_env) {
            tracing::warn!(key = err.key, value = %err.value, reason = err.reason, "ignoring env override");
        }
        config
    }

    /// Defaults plus overrides; the first invalid value is an error.
    pub fn try_from_env_with<F>(get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        match config.apply_env(&get_env).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(config),
        }
    }

    fn apply_env<F>(&mut self, get_env: &F) -> Vec<ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();

        match env_millis(get_env, ENV_STDOUT_WINDOW_MS) {
            Ok(Some(window)) => self.stdout_window = window,
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
        match env_millis(get_env, ENV_RENDER_WINDOW_MS) {
            Ok(Some(window)) => self.render_window = window,
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
        if let Some(value) = get_env(ENV_LIVE) {
            match LiveMode::parse(&value) {
                Some(mode) => self.live = mode,
                None => errors.push(ConfigError::new(
                    ENV_LIVE,
                    value,
                    "expected auto, always or never",
                )),
            }
        }
        match env_bool(get_env, ENV_CLEAR_SCREEN) {
            Ok(Some(v)) => self.clear_screen = v,
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
        match env_bool(get_env, ENV_RENDER_SUCCEED) {
            Ok(Some(v)) => self.render_succeed = Some(v),
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
        match env_bool(get_env, ENV_LOG_HEAP) {
            Ok(Some(v)) => self.log_heap_usage = v,
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
        if get_env(ENV_NO_COLOR).is_some_and(|v| !v.is_empty()) {
            self.color = Some(false);
        }

        errors
    }

    /// Flush policy for a stream. A zero stdout window means "immediate".
    #[must_use]
    pub fn flush_policy(&self, stream: StreamId) -> FlushPolicy {
        if self.stdout_window.is_zero() {
            return FlushPolicy::Immediate;
        }
        FlushPolicy::default_for(stream, self.stdout_window)
    }

    /// Whether colors are used on `terminal`.
    #[must_use]
    pub fn color_for(&self, terminal: &TerminalInfo) -> bool {
        self.color.unwrap_or_else(|| terminal.color_enabled())
    }
}

fn env_millis<F>(get_env: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = get_env(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| ConfigError::new(key, value, "expected milliseconds"))
}

fn env_bool<F>(get_env: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = get_env(key) else {
        return Ok(None);
    };
    match parse_bool(&value) {
        Some(v) => Ok(Some(v)),
        None => Err(ConfigError::new(key, value, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn get_env<'a>(map: &'a HashMap<String, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ReporterConfig::default();
        assert_eq!(config.stdout_window, Duration::from_millis(100));
        assert_eq!(config.render_window, Duration::from_millis(100));
        assert_eq!(config.live, LiveMode::Auto);
        assert!(config.clear_screen);
        assert_eq!(config.render_succeed, None);
        assert!(!config.log_heap_usage);
    }

    #[test]
    fn env_overrides_apply() {
        let env = map_env(&[
            (ENV_STDOUT_WINDOW_MS, "25"),
            (ENV_RENDER_WINDOW_MS, "250"),
            (ENV_LIVE, "Never"),
            (ENV_CLEAR_SCREEN, "no"),
            (ENV_RENDER_SUCCEED, "1"),
            (ENV_LOG_HEAP, "on"),
            (ENV_NO_COLOR, "1"),
        ]);
        let config = ReporterConfig::try_from_env_with(get_env(&env)).expect("valid env");
        assert_eq!(config.stdout_window, Duration::from_millis(25));
        assert_eq!(config.render_window, Duration::from_millis(250));
        assert_eq!(config.live, LiveMode::Never);
        assert!(!config.clear_screen);
        assert_eq!(config.render_succeed, Some(true));
        assert!(config.log_heap_usage);
        assert_eq!(config.color, Some(false));
    }

    #[test]
    fn invalid_values_are_ignored_by_lenient_parse() {
        let env = map_env(&[(ENV_STDOUT_WINDOW_MS, "fast"), (ENV_LIVE, "always")]);
        let config = ReporterConfig::from_env_with(get_env(&env));
        assert_eq!(config.stdout_window, DEFAULT_WINDOW);
        assert_eq!(config.live, LiveMode::Always);
    }

    #[test]
    fn invalid_values_surface_in_strict_parse() {
        let env = map_env(&[(ENV_LIVE, "sometimes")]);
        let err = ReporterConfig::try_from_env_with(get_env(&env)).expect_err("invalid");
        assert_eq!(err.key, ENV_LIVE);
        assert_eq!(err.value, "sometimes");
    }

    #[test]
    fn zero_stdout_window_means_immediate() {
        let config = ReporterConfig::default().with_stdout_window(Duration::ZERO);
        assert_eq!(config.flush_policy(StreamId::Stdout), FlushPolicy::Immediate);

        let config = ReporterConfig::default();
        assert_eq!(
            config.flush_policy(StreamId::Stdout),
            FlushPolicy::Windowed(DEFAULT_WINDOW)
        );
        assert_eq!(config.flush_policy(StreamId::Stderr), FlushPolicy::Immediate);
    }

    #[test]
    fn live_mode_resolution() {
        let tty = TerminalInfo::interactive();
        let pipe = TerminalInfo::plain();
        assert!(LiveMode::Auto.enabled_for(&tty));
        assert!(!LiveMode::Auto.enabled_for(&pipe));
        assert!(LiveMode::Always.enabled_for(&pipe));
        assert!(!LiveMode::Never.enabled_for(&tty));
    }

    #[test]
    fn color_follows_terminal_unless_forced() {
        let config = ReporterConfig::default();
        assert!(config.color_for(&TerminalInfo::interactive()));
        assert!(!config.color_for(&TerminalInfo::plain()));
        assert!(config.clone().with_color(true).color_for(&TerminalInfo::plain()));
    }

    #[test]
    fn filter_is_callable_and_debug_hides_it() {
        let config = ReporterConfig::default().with_console_log_filter(|text, _| !text.contains("noise"));
        let filter = config.console_log_filter.clone().expect("filter");
        assert!(filter("hello", StreamId::Stdout));
        assert!(!filter("noise", StreamId::Stdout));
        assert!(format!("{config:?}").contains("console_log_filter: true"));
    }
}
