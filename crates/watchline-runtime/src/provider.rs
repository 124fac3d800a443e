#![forbid(unsafe_code)]

//! Capabilities the reporter consumes from its host.
//!
//! [`StateProvider`] answers "what do the test files look like right now";
//! [`Logger`] is the only text path the reporter uses for its own messages.
//! [`MemoryState`] is an in-memory provider used by the harness and tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::{FileResult, TaskResultPack, TestError};

/// Aggregate test-file state, queried on demand.
pub trait StateProvider {
    /// Files, optionally restricted to `filter` paths.
    fn files(&self, filter: Option<&[String]>) -> Vec<FileResult>;

    /// Errors raised outside any test.
    fn unhandled_errors(&self) -> Vec<TestError>;
}

/// Text sink for reporter messages.
pub trait Logger {
    /// Write a line to standard output.
    fn log(&mut self, text: &str);

    /// Write a line to standard error.
    fn error(&mut self, text: &str);

    /// Clear the screen and show `message`.
    ///
    /// Without `force` the clear may be deferred until the next output so a
    /// quiet rerun does not blank the screen.
    fn clear_screen(&mut self, message: &str, force: bool);
}

#[derive(Debug, Default)]
struct Inner {
    files: Vec<FileResult>,
    errors: Vec<TestError>,
    index: HashMap<String, (usize, usize)>,
}

impl Inner {
    fn reindex(&mut self) {
        self.index.clear();
        for (f, file) in self.files.iter().enumerate() {
            for (t, task) in file.tasks.iter().enumerate() {
                self.index.insert(task.id.0.clone(), (f, t));
            }
        }
    }
}

/// Shared in-memory [`StateProvider`].
///
/// Clones share storage, so the driver can keep mutating a handle after
/// giving one to the reporter.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole file set.
    pub fn set_files(&self, files: Vec<FileResult>) {
        let mut inner = self.inner.borrow_mut();
        inner.files = files;
        inner.reindex();
    }

    /// Insert or replace one file by path.
    pub fn upsert_file(&self, file: FileResult) {
        let mut inner = self.inner.borrow_mut();
        match inner.files.iter_mut().find(|f| f.path == file.path) {
            Some(slot) => *slot = file,
            None => inner.files.push(file),
        }
        inner.reindex();
    }

    /// Drop a file by path. Returns whether it existed.
    pub fn remove_file(&self, path: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.files.len();
        inner.files.retain(|f| f.path != path);
        let removed = inner.files.len() != before;
        if removed {
            inner.reindex();
        }
        removed
    }

    /// Apply a task-update batch. Unknown task ids are ignored.
    ///
    /// Returns how many packs matched a task.
    pub fn apply_packs(&self, packs: &[TaskResultPack]) -> usize {
        let mut inner = self.inner.borrow_mut();
        let mut applied = 0;
        for (id, result) in packs {
            let Some(result) = result else { continue };
            let Some(&(f, t)) = inner.index.get(id.as_str()) else {
                continue;
            };
            let file = &mut inner.files[f];
            file.tasks[t].apply(result);
            file.refresh_state();
            applied += 1;
        }
        applied
    }

    /// Record an unhandled error.
    pub fn push_error(&self, error: TestError) {
        self.inner.borrow_mut().errors.push(error);
    }

    /// Forget unhandled errors (start of a new run).
    pub fn clear_errors(&self) {
        self.inner.borrow_mut().errors.clear();
    }
}

impl StateProvider for MemoryState {
    fn files(&self, filter: Option<&[String]>) -> Vec<FileResult> {
        let inner = self.inner.borrow();
        match filter {
            Some(paths) => inner
                .files
                .iter()
                .filter(|f| paths.iter().any(|p| p == &f.path))
                .cloned()
                .collect(),
            None => inner.files.clone(),
        }
    }

    fn unhandled_errors(&self) -> Vec<TestError> {
        self.inner.borrow().errors.clone()
    }
}
