#![forbid(unsafe_code)]

//! Live renderer interface and the default status-list renderer.
//!
//! A [`LiveRenderer`] draws an in-place block of status lines and can erase
//! exactly what it drew. It never decides *when* to draw: the
//! [`RenderCoordinator`](crate::coordinator::RenderCoordinator) sequences
//! every call so raw text and status redraws never interleave.

use std::io::Write;
use std::time::Duration;

use unicode_width::UnicodeWidthChar;
use watchline_core::terminal::erase_lines;

use crate::error::RenderResult;
use crate::model::{FileResult, TaskState, TaskSummary};
use crate::style::Palette;

/// Options handed to a renderer when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererOptions {
    /// List passing tests under each file.
    pub render_succeed: bool,
    /// Append heap usage to finished files.
    pub show_heap: bool,
    /// Emit ANSI colors.
    pub color: bool,
    /// Truncate lines to this many columns.
    pub width: Option<usize>,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            render_succeed: false,
            show_heap: false,
            color: true,
            width: None,
        }
    }
}

/// An in-place status display.
pub trait LiveRenderer {
    /// Replace the model. Does not draw.
    fn update_files(&mut self, files: Vec<FileResult>);

    /// Draw the full status block at the cursor.
    fn draw(&mut self, out: &mut dyn Write) -> RenderResult<()>;

    /// Erase exactly the lines of the last draw.
    fn erase(&mut self, out: &mut dyn Write) -> RenderResult<()>;

    /// Release the terminal. The last drawn frame stays on screen.
    fn stop(&mut self) {}

    /// Period of self-driven redraws (spinners), if any.
    fn refresh_interval(&self) -> Option<Duration> {
        None
    }

    /// Advance animation state before a periodic redraw.
    fn on_refresh(&mut self) {}
}

/// Creates a renderer for each run.
pub trait RendererFactory {
    fn create(&mut self, files: Vec<FileResult>, options: RendererOptions) -> Box<dyn LiveRenderer>;
}

impl<F> RendererFactory for F
where
    F: FnMut(Vec<FileResult>, RendererOptions) -> Box<dyn LiveRenderer>,
{
    fn create(&mut self, files: Vec<FileResult>, options: RendererOptions) -> Box<dyn LiveRenderer> {
        self(files, options)
    }
}

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_INTERVAL: Duration = Duration::from_millis(80);

/// One line per file, failing tests nested under their file.
#[derive(Debug, Clone)]
pub struct StatusListRenderer {
    files: Vec<FileResult>,
    options: RendererOptions,
    palette: Palette,
    drawn_lines: usize,
    frame: usize,
}

impl StatusListRenderer {
    #[must_use]
    pub fn new(files: Vec<FileResult>, options: RendererOptions) -> Self {
        Self {
            files,
            options,
            palette: Palette::new(options.color),
            drawn_lines: 0,
            frame: 0,
        }
    }

    /// Factory using the current terminal width.
    pub fn factory() -> impl RendererFactory {
        |files: Vec<FileResult>, mut options: RendererOptions| -> Box<dyn LiveRenderer> {
            if options.width.is_none() {
                options.width = crossterm::terminal::size()
                    .ok()
                    .map(|(cols, _)| usize::from(cols));
            }
            Box::new(StatusListRenderer::new(files, options))
        }
    }

    /// Lines currently on screen.
    #[must_use]
    pub fn drawn_lines(&self) -> usize {
        self.drawn_lines
    }

    fn running(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.state, TaskState::Run | TaskState::Queued))
    }

    fn file_symbol(&self, file: &FileResult) -> String {
        let p = self.palette;
        match file.state {
            TaskState::Pass => p.green("✓"),
            TaskState::Fail => p.red("❯"),
            TaskState::Skip | TaskState::Todo => p.yellow("↓"),
            TaskState::Run => p.yellow(SPINNER[self.frame % SPINNER.len()]),
            TaskState::Queued | TaskState::Pending => p.dim("·"),
        }
    }

    fn task_symbol(&self, task: &TaskSummary) -> String {
        let p = self.palette;
        match task.state {
            TaskState::Pass => p.green("✓"),
            TaskState::Fail => p.red("×"),
            TaskState::Skip | TaskState::Todo => p.yellow("↓"),
            TaskState::Run => p.yellow(SPINNER[self.frame % SPINNER.len()]),
            TaskState::Queued | TaskState::Pending => p.dim("·"),
        }
    }

    fn file_line(&self, file: &FileResult) -> String {
        let p = self.palette;
        let total = file.tasks.len();
        let failed = file.failed_tasks().count();
        let mut counts = format!("({total})");
        if failed > 0 {
            counts = format!("({total} | {})", p.red(&format!("{failed} failed")));
        }
        let mut line = format!(" {} {} {}", self.file_symbol(file), file.path, p.dim(&counts));
        if file.state.is_finished() {
            let elapsed: Duration = file.tasks.iter().filter_map(|t| t.duration).sum();
            if !elapsed.is_zero() {
                line.push(' ');
                line.push_str(&p.yellow(&format!("{}ms", elapsed.as_millis())));
            }
            if self.options.show_heap
                && let Some(heap) = file.heap
            {
                line.push(' ');
                line.push_str(&p.dim(&format!("{} MB heap used", heap / (1024 * 1024))));
            }
        }
        line
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for file in &self.files {
            lines.push(self.file_line(file));
            for task in &file.tasks {
                let show = match task.state {
                    TaskState::Fail | TaskState::Run => true,
                    TaskState::Pass => self.options.render_succeed,
                    _ => false,
                };
                if show {
                    lines.push(format!("   {} {}", self.task_symbol(task), task.name));
                }
                if task.state == TaskState::Fail {
                    for err in &task.errors {
                        lines.push(format!("     {}", self.palette.red(&format!("→ {}", err.message))));
                    }
                }
            }
        }
        match self.options.width {
            Some(width) => lines.into_iter().map(|l| truncate(&l, width)).collect(),
            None => lines,
        }
    }
}

impl LiveRenderer for StatusListRenderer {
    fn update_files(&mut self, files: Vec<FileResult>) {
        self.files = files;
    }

    fn draw(&mut self, out: &mut dyn Write) -> RenderResult<()> {
        let lines = self.lines();
        let mut frame = String::new();
        for line in &lines {
            frame.push_str(line);
            frame.push('\n');
        }
        out.write_all(frame.as_bytes())?;
        out.flush()?;
        self.drawn_lines = lines.len();
        Ok(())
    }

    fn erase(&mut self, out: &mut dyn Write) -> RenderResult<()> {
        if self.drawn_lines == 0 {
            return Ok(());
        }
        out.write_all(erase_lines(self.drawn_lines).as_bytes())?;
        out.flush()?;
        self.drawn_lines = 0;
        Ok(())
    }

    fn stop(&mut self) {
        self.drawn_lines = 0;
    }

    fn refresh_interval(&self) -> Option<Duration> {
        self.running().then_some(SPINNER_INTERVAL)
    }

    fn on_refresh(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }
}

/// Cut a styled line to `width` visible columns. Escape sequences are kept
/// and do not count toward the width.
fn truncate(line: &str, width: usize) -> String {
    let mut out = String::with_capacity(line.len());
    let mut used = 0;
    let mut chars = line.chars().peekable();
    let mut cut = false;
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            out.push(ch);
            if chars.peek() == Some(&'[') {
                for next in chars.by_ref() {
                    out.push(next);
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        if cut {
            continue;
        }
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            cut = true;
            continue;
        }
        used += w;
        out.push(ch);
    }
    out
}
