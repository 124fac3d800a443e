#![forbid(unsafe_code)]

//! Command-line argument parsing for the harness.
//!
//! Parses args manually. Environment variables with the
//! `WATCHLINE_HARNESS_*` prefix supply defaults that flags override.

use std::env;
use std::path::PathBuf;
use std::process;

use watchline_core::logging::LogFormat;
use watchline_runtime::LiveMode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
watchline-harness - replay a scripted watch session through the reporter

USAGE:
    watchline-harness [OPTIONS]

OPTIONS:
    --scenario=PATH      Scenario JSON to replay (default: bundled demo)
    --speed=F            Playback speed multiplier, > 0 (default: 1)
    --live=MODE          Live status: 'auto' (default), 'always' or 'never'
    --log-file=PATH      Append diagnostics to PATH
    --log-format=FMT     Diagnostics format: 'text' (default) or 'json'
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    WATCHLINE_HARNESS_SCENARIO     Override --scenario
    WATCHLINE_HARNESS_SPEED        Override --speed
    WATCHLINE_HARNESS_LIVE         Override --live
    WATCHLINE_HARNESS_LOG_FILE     Override --log-file
    WATCHLINE_HARNESS_LOG_FORMAT   Override --log-format
    WATCHLINE_LOG                  Diagnostics filter (falls back to RUST_LOG)

Reporter settings (WATCHLINE_STDOUT_WINDOW_MS, WATCHLINE_RENDER_WINDOW_MS,
WATCHLINE_CLEAR_SCREEN, ...) are read from the environment as usual.";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    pub scenario: Option<PathBuf>,
    pub speed: f64,
    /// `None` keeps the reporter's own (env) setting.
    pub live: Option<LiveMode>,
    pub log_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            scenario: None,
            speed: 1.0,
            live: None,
            log_file: None,
            log_format: LogFormat::Text,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

fn parse_speed(val: &str) -> Result<f64, String> {
    match val.trim().parse::<f64>() {
        Ok(speed) if speed.is_finite() && speed > 0.0 => Ok(speed),
        _ => Err(format!("Invalid speed value: {val}")),
    }
}

fn parse_live(val: &str) -> Result<LiveMode, String> {
    LiveMode::parse(val).ok_or_else(|| format!("Invalid live mode: {val}"))
}

fn parse_format(val: &str) -> Result<LogFormat, String> {
    match val.trim().to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(format!("Invalid log format: {val}")),
    }
}

impl Opts {
    /// Parse the process arguments and environment, exiting on `--help`,
    /// `--version` or invalid input.
    pub fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match Self::parse_from(&args, |key| env::var(key).ok()) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("watchline-harness {VERSION}");
                process::exit(0);
            }
            Err(msg) => {
                eprintln!("{msg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` (without the program name) with env lookups from
    /// `get_env`. Flags win over environment values.
    pub fn parse_from<F>(args: &[String], get_env: F) -> Result<Command, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        if let Some(val) = get_env("WATCHLINE_HARNESS_SCENARIO") {
            opts.scenario = Some(PathBuf::from(val));
        }
        if let Some(val) = get_env("WATCHLINE_HARNESS_SPEED") {
            opts.speed = parse_speed(&val)?;
        }
        if let Some(val) = get_env("WATCHLINE_HARNESS_LIVE") {
            opts.live = Some(parse_live(&val)?);
        }
        if let Some(val) = get_env("WATCHLINE_HARNESS_LOG_FILE") {
            opts.log_file = Some(PathBuf::from(val));
        }
        if let Some(val) = get_env("WATCHLINE_HARNESS_LOG_FORMAT") {
            opts.log_format = parse_format(&val)?;
        }

        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                other => {
                    if let Some(val) = other.strip_prefix("--scenario=") {
                        opts.scenario = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--speed=") {
                        opts.speed = parse_speed(val)?;
                    } else if let Some(val) = other.strip_prefix("--live=") {
                        opts.live = Some(parse_live(val)?);
                    } else if let Some(val) = other.strip_prefix("--log-file=") {
                        opts.log_file = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--log-format=") {
                        opts.log_format = parse_format(val)?;
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }

        Ok(Command::Run(opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn map_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn run(list: &[&str], env: &HashMap<String, String>) -> Opts {
        match Opts::parse_from(&args(list), |key| env.get(key).cloned()) {
            Ok(Command::Run(opts)) => opts,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn default_opts() {
        let opts = run(&[], &HashMap::new());
        assert_eq!(opts, Opts::default());
        assert_eq!(opts.speed, 1.0);
    }

    #[test]
    fn flags_are_parsed() {
        let opts = run(
            &[
                "--scenario=s.json",
                "--speed=2.5",
                "--live=never",
                "--log-file=h.log",
                "--log-format=json",
            ],
            &HashMap::new(),
        );
        assert_eq!(opts.scenario, Some(PathBuf::from("s.json")));
        assert_eq!(opts.speed, 2.5);
        assert_eq!(opts.live, Some(LiveMode::Never));
        assert_eq!(opts.log_file, Some(PathBuf::from("h.log")));
        assert_eq!(opts.log_format, LogFormat::Json);
    }

    #[test]
    fn flags_override_env() {
        let env = map_env(&[
            ("WATCHLINE_HARNESS_SPEED", "4"),
            ("WATCHLINE_HARNESS_LIVE", "always"),
        ]);
        let opts = run(&["--speed=0.5"], &env);
        assert_eq!(opts.speed, 0.5);
        assert_eq!(opts.live, Some(LiveMode::Always));
    }

    #[test]
    fn invalid_values_are_errors() {
        let none = |_: &str| None;
        assert!(Opts::parse_from(&args(&["--speed=0"]), none).is_err());
        assert!(Opts::parse_from(&args(&["--speed=fast"]), none).is_err());
        assert!(Opts::parse_from(&args(&["--live=sometimes"]), none).is_err());
        assert!(Opts::parse_from(&args(&["--bogus"]), none).is_err());
        let bad_env = |key: &str| (key == "WATCHLINE_HARNESS_SPEED").then(|| "-1".to_string());
        assert!(Opts::parse_from(&[], bad_env).is_err());
    }

    #[test]
    fn help_and_version_short_circuit() {
        let none = |_: &str| None;
        assert_eq!(
            Opts::parse_from(&args(&["--speed=nope", "-h"]), none),
            Err("Invalid speed value: nope".to_string())
        );
        assert_eq!(Opts::parse_from(&args(&["-h"]), none), Ok(Command::Help));
        assert_eq!(Opts::parse_from(&args(&["--version"]), none), Ok(Command::Version));
    }

    #[test]
    fn help_text_lists_env_overrides() {
        assert!(HELP_TEXT.contains("WATCHLINE_HARNESS_SPEED"));
        assert!(!VERSION.is_empty());
    }
}
