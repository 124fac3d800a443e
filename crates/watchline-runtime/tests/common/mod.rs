//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use watchline_runtime::{
    CaptureSink, FileResult, InteractiveReporter, LiveRenderer, ManualClock, MemoryState,
    RenderError, RenderResult, RendererOptions, ReporterConfig, TaskId, TaskResult,
    TaskResultPack, TaskState, TaskSummary, TerminalInfo,
};

/// Renderer calls observed by a [`Recording`] renderer, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Mount(usize),
    Update,
    Draw(String),
    Erase,
    Stop(usize),
}

#[derive(Debug, Default)]
pub struct Journal {
    pub calls: Vec<Call>,
    pub fail_draws: bool,
    pub fail_erases: bool,
    mounted: usize,
}

impl Journal {
    pub fn draws(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Draw(_))).count()
    }

    pub fn stops(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Stop(_))).count()
    }

    pub fn mounts(&self) -> usize {
        self.mounted
    }
}

pub type SharedJournal = Rc<RefCell<Journal>>;

/// Draws `[done/total]` and records every call.
pub struct Recording {
    id: usize,
    files: Vec<FileResult>,
    journal: SharedJournal,
}

impl Recording {
    pub fn frame(files: &[FileResult]) -> String {
        let total: usize = files.iter().map(|f| f.tasks.len()).sum();
        let done: usize = files.iter().map(FileResult::finished_count).sum();
        format!("[{done}/{total}]")
    }
}

impl LiveRenderer for Recording {
    fn update_files(&mut self, files: Vec<FileResult>) {
        self.files = files;
        self.journal.borrow_mut().calls.push(Call::Update);
    }

    fn draw(&mut self, out: &mut dyn Write) -> RenderResult<()> {
        let frame = Self::frame(&self.files);
        let mut journal = self.journal.borrow_mut();
        journal.calls.push(Call::Draw(frame.clone()));
        if journal.fail_draws {
            return Err(RenderError::Renderer("draw refused".into()));
        }
        out.write_all(frame.as_bytes())?;
        Ok(())
    }

    fn erase(&mut self, out: &mut dyn Write) -> RenderResult<()> {
        let mut journal = self.journal.borrow_mut();
        journal.calls.push(Call::Erase);
        if journal.fail_erases {
            return Err(RenderError::Renderer("erase refused".into()));
        }
        out.write_all(b"<E>")?;
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.borrow_mut().calls.push(Call::Stop(self.id));
    }
}

/// Factory closure producing [`Recording`] renderers over one journal.
pub fn recording_factory(
    journal: SharedJournal,
) -> impl FnMut(Vec<FileResult>, RendererOptions) -> Box<dyn LiveRenderer> {
    move |files: Vec<FileResult>, _options: RendererOptions| -> Box<dyn LiveRenderer> {
        let id = {
            let mut j = journal.borrow_mut();
            j.mounted += 1;
            let id = j.mounted;
            j.calls.push(Call::Mount(id));
            id
        };
        Box::new(Recording {
            id,
            files,
            journal: Rc::clone(&journal),
        })
    }
}

pub struct Harness {
    pub reporter: InteractiveReporter,
    pub clock: ManualClock,
    pub state: MemoryState,
    pub out: CaptureSink,
    pub err: CaptureSink,
    pub journal: SharedJournal,
}

impl Harness {
    pub fn new(config: ReporterConfig) -> Self {
        Self::with_terminal(config, TerminalInfo::interactive())
    }

    /// Colors are always off so assertions compare plain text.
    pub fn with_terminal(config: ReporterConfig, terminal: TerminalInfo) -> Self {
        let clock = ManualClock::new();
        let state = MemoryState::new();
        let out = CaptureSink::new();
        let err = CaptureSink::new();
        let journal = SharedJournal::default();
        let reporter = InteractiveReporter::builder(config.with_color(false))
            .stdout(out.clone())
            .stderr(err.clone())
            .clock(clock.clone())
            .state(state.clone())
            .terminal(terminal)
            .renderer_factory(recording_factory(Rc::clone(&journal)))
            .build();
        Self {
            reporter,
            clock,
            state,
            out,
            err,
            journal,
        }
    }

    /// Advance the clock by `ms` and poll once.
    pub fn tick(&mut self, ms: u64) {
        self.clock.advance_ms(ms);
        self.reporter.poll();
    }

    /// Advance in 1 ms steps, polling each step.
    pub fn run_for(&mut self, ms: u64) {
        for _ in 0..ms {
            self.tick(1);
        }
    }

    /// Poll until no timer is pending (bounded).
    pub fn drain(&mut self) {
        for _ in 0..10_000 {
            let Some(wait) = self.reporter.time_until_next() else {
                return;
            };
            self.clock.advance(wait);
            self.reporter.poll();
        }
        panic!("timers never settled");
    }
}

/// A file with `n` pending tasks named `{path}#i`.
pub fn file(path: &str, n: usize) -> FileResult {
    let tasks = (0..n)
        .map(|i| TaskSummary::new(format!("{path}#{i}"), format!("case {i}")))
        .collect();
    FileResult::new(path).with_tasks(tasks)
}

pub fn pack(id: &str, state: TaskState) -> TaskResultPack {
    (
        TaskId::from(id),
        Some(TaskResult {
            state,
            ..TaskResult::default()
        }),
    )
}
