#![forbid(unsafe_code)]

//! End-of-run summary.

use std::time::Duration;

use crate::model::{FileResult, TaskState, TestError};
use crate::style::Palette;

/// Formats the final summary of a run.
pub trait SummaryPresenter {
    /// Lines to print, without trailing newlines.
    fn present(
        &self,
        files: &[FileResult],
        errors: &[TestError],
        elapsed: Option<Duration>,
        palette: Palette,
    ) -> Vec<String>;
}

/// Counts per category, failed tests, and unhandled errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSummary;

#[derive(Debug, Default)]
struct Counts {
    passed: usize,
    failed: usize,
    skipped: usize,
    todo: usize,
    total: usize,
}

impl Counts {
    fn add(&mut self, state: TaskState) {
        self.total += 1;
        match state {
            TaskState::Pass => self.passed += 1,
            TaskState::Fail => self.failed += 1,
            TaskState::Skip => self.skipped += 1,
            TaskState::Todo => self.todo += 1,
            _ => {}
        }
    }

    fn render(&self, p: Palette) -> String {
        let mut parts = Vec::new();
        if self.failed > 0 {
            parts.push(p.bold(&p.red(&format!("{} failed", self.failed))));
        }
        if self.passed > 0 {
            parts.push(p.bold(&p.green(&format!("{} passed", self.passed))));
        }
        if self.skipped > 0 {
            parts.push(p.yellow(&format!("{} skipped", self.skipped)));
        }
        if self.todo > 0 {
            parts.push(p.gray(&format!("{} todo", self.todo)));
        }
        let body = if parts.is_empty() {
            "no tests".to_owned()
        } else {
            parts.join(p.dim(" | ").as_str())
        };
        format!("{body} {}", p.gray(&format!("({})", self.total)))
    }
}

fn label(p: Palette, name: &str) -> String {
    p.dim(&format!("{name:>11}  "))
}

impl SummaryPresenter for DefaultSummary {
    fn present(
        &self,
        files: &[FileResult],
        errors: &[TestError],
        elapsed: Option<Duration>,
        p: Palette,
    ) -> Vec<String> {
        let mut lines = Vec::new();

        let failed: Vec<(&FileResult, &crate::model::TaskSummary)> = files
            .iter()
            .flat_map(|f| f.failed_tasks().map(move |t| (f, t)))
            .collect();
        if !failed.is_empty() {
            lines.push(p.red(&format!(" Failed Tests {} ", failed.len())));
            lines.push(String::new());
            for (file, task) in &failed {
                lines.push(format!(" {} {} > {}", p.red("FAIL"), file.path, task.name));
                for err in &task.errors {
                    lines.push(p.red(&format!("{err}")));
                    if let Some(stack) = &err.stack {
                        lines.push(p.dim(stack));
                    }
                }
                lines.push(String::new());
            }
        }

        if !errors.is_empty() {
            lines.push(p.red(&format!(" Unhandled Errors {} ", errors.len())));
            lines.push(String::new());
            for err in errors {
                lines.push(p.red(&format!("{err}")));
                if let Some(stack) = &err.stack {
                    lines.push(p.dim(stack));
                }
            }
            lines.push(String::new());
        }

        let mut file_counts = Counts::default();
        let mut test_counts = Counts::default();
        for file in files {
            file_counts.add(file.state);
            for task in &file.tasks {
                test_counts.add(task.state);
            }
        }
        lines.push(format!("{}{}", label(p, "Test Files"), file_counts.render(p)));
        lines.push(format!("{}{}", label(p, "Tests"), test_counts.render(p)));
        if !errors.is_empty() {
            let noun = if errors.len() == 1 { "error" } else { "errors" };
            lines.push(format!(
                "{}{}",
                label(p, "Errors"),
                p.bold(&p.red(&format!("{} {noun}", errors.len())))
            ));
        }
        if let Some(elapsed) = elapsed {
            lines.push(format!("{}{}ms", label(p, "Duration"), elapsed.as_millis()));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskSummary;

    fn file(path: &str, states: &[TaskState]) -> FileResult {
        let tasks = states
            .iter()
            .enumerate()
            .map(|(i, s)| TaskSummary {
                state: *s,
                ..TaskSummary::new(format!("{path}#{i}"), format!("case {i}"))
            })
            .collect();
        let mut f = FileResult::new(path).with_tasks(tasks);
        f.refresh_state();
        f
    }

    #[test]
    fn counts_only_when_everything_passes() {
        let files = vec![
            file("a.test.ts", &[TaskState::Pass, TaskState::Pass]),
            file("b.test.ts", &[TaskState::Pass, TaskState::Skip]),
        ];
        let lines = DefaultSummary.present(&files, &[], Some(Duration::from_millis(42)), Palette::plain());
        assert_eq!(
            lines,
            vec![
                " Test Files  2 passed (2)",
                "      Tests  3 passed | 1 skipped (4)",
                "   Duration  42ms",
            ]
        );
    }

    #[test]
    fn failures_and_unhandled_errors_are_listed() {
        let mut failing = file("a.test.ts", &[TaskState::Fail]);
        failing.tasks[0].errors.push(TestError::new("AssertionError", "nope"));
        let lines = DefaultSummary.present(
            &[failing],
            &[TestError::new("TypeError", "x is undefined")],
            None,
            Palette::plain(),
        );
        assert_eq!(lines[0], " Failed Tests 1 ");
        assert!(lines.contains(&" FAIL a.test.ts > case 0".to_string()));
        assert!(lines.contains(&"AssertionError: nope".to_string()));
        assert!(lines.contains(&" Unhandled Errors 1 ".to_string()));
        assert!(lines.contains(&"     Errors  1 error".to_string()));
        assert!(lines.contains(&" Test Files  1 failed (1)".to_string()));
    }

    #[test]
    fn empty_run() {
        let lines = DefaultSummary.present(&[], &[], None, Palette::plain());
        assert_eq!(lines, vec![" Test Files  no tests (0)", "      Tests  no tests (0)"]);
    }
}
