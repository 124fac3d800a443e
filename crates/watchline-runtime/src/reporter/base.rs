#![forbid(unsafe_code)]

//! Default hook behavior shared by reporters: summary, watch messages,
//! rerun notice, console log routing.
//!
//! `BaseReporter` holds no output of its own. Every method takes the
//! [`Logger`] to write through, which in practice is the output arbiter.

use std::path::Path;
use std::time::Instant;

use crossterm::style::Color;
use watchline_core::StreamId;

use crate::config::ReporterConfig;
use crate::model::{FileResult, TaskState, TestError, UserConsoleLog};
use crate::provider::Logger;
use crate::style::Palette;
use crate::summary::SummaryPresenter;

const HINT_PADDING: &str = "       ";

pub struct BaseReporter {
    config: ReporterConfig,
    summary: Box<dyn SummaryPresenter>,
    palette: Palette,
    started_at: Option<Instant>,
    watch_filters: Option<Vec<String>>,
    is_tty: bool,
}

impl std::fmt::Debug for BaseReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseReporter")
            .field("config", &self.config)
            .field("palette", &self.palette)
            .field("watch_filters", &self.watch_filters)
            .field("is_tty", &self.is_tty)
            .finish_non_exhaustive()
    }
}

impl BaseReporter {
    pub fn new(
        config: ReporterConfig,
        summary: Box<dyn SummaryPresenter>,
        palette: Palette,
        is_tty: bool,
    ) -> Self {
        Self {
            config,
            summary,
            palette,
            started_at: None,
            watch_filters: None,
            is_tty,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    #[must_use]
    pub fn palette(&self) -> Palette {
        self.palette
    }

    #[must_use]
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Files of the current rerun, if one narrowed the run.
    #[must_use]
    pub fn watch_filters(&self) -> Option<&[String]> {
        self.watch_filters.as_deref()
    }

    /// Start the run timer.
    pub fn mark_start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    /// `path` relative to the configured root, when it is under it.
    #[must_use]
    pub fn relative(&self, path: &str) -> String {
        Path::new(path)
            .strip_prefix(&self.config.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.to_owned())
    }

    /// Whether a console log passes the user filter.
    #[must_use]
    pub fn should_log(&self, log: &UserConsoleLog) -> bool {
        match &self.config.console_log_filter {
            Some(filter) => filter(&log.content, log.stream),
            None => true,
        }
    }

    /// Print the summary of `files`.
    pub fn report_summary(
        &self,
        logger: &mut dyn Logger,
        files: &[FileResult],
        errors: &[TestError],
        now: Instant,
    ) {
        let elapsed = self.started_at.map(|start| now.saturating_duration_since(start));
        for line in self.summary.present(files, errors, elapsed, self.palette) {
            logger.log(&line);
        }
    }

    pub fn on_finished(
        &mut self,
        logger: &mut dyn Logger,
        files: &[FileResult],
        errors: &[TestError],
        now: Instant,
    ) {
        self.report_summary(logger, files, errors, now);
    }

    /// "Waiting for file changes" with a key hint.
    pub fn on_watcher_start(&self, logger: &mut dyn Logger, files: &[FileResult], errors: &[TestError]) {
        let p = self.palette;
        let failed = !errors.is_empty()
            || files
                .iter()
                .any(|f| f.state == TaskState::Fail || f.failed_tasks().next().is_some());
        if failed {
            logger.log(&format!(
                "\n{}  {}",
                p.badge("FAIL", Color::Red),
                p.red("Tests failed. Watching for file changes...")
            ));
        } else {
            logger.log(&format!(
                "\n{}  {}",
                p.badge("PASS", Color::Green),
                p.green("Waiting for file changes...")
            ));
        }
        let hints = [
            format!("{}{}{}", p.dim("press "), p.bold("h"), p.dim(" to show help")),
            format!("{}{}{}", p.dim("press "), p.bold("q"), p.dim(" to quit")),
        ];
        logger.log(&format!("{HINT_PADDING}{}", hints.join(p.dim(", ").as_str())));
    }

    /// Narrow subsequent state queries to `files` and announce the rerun.
    ///
    /// The clear is forced: it must land before the next run draws, never
    /// after that run's final frame.
    pub fn on_watcher_rerun(&mut self, logger: &mut dyn Logger, files: &[String], trigger: Option<&str>) {
        self.watch_filters = Some(files.to_vec());
        let p = self.palette;
        let mut message = format!("\n{}", p.badge("RERUN", Color::Blue));
        if let Some(trigger) = trigger {
            message.push_str(&p.dim(&format!(" {}", self.relative(trigger))));
        }
        logger.clear_screen(&message, true);
    }

    /// Header line plus content, routed to the log's stream.
    pub fn on_user_console_log(&self, logger: &mut dyn Logger, log: &UserConsoleLog) {
        let origin = log
            .origin
            .clone()
            .or_else(|| log.task_id.as_ref().map(|id| id.to_string()))
            .unwrap_or_else(|| "unknown test".to_owned());
        let p = self.palette;
        let header = p.gray(&format!("{}{}", log.stream, p.dim(&format!(" | {origin}"))));
        let text = format!("{header}\n{}", log.content);
        match log.stream {
            StreamId::Stdout => logger.log(&text),
            StreamId::Stderr => logger.error(&text),
        }
    }
}
