#![forbid(unsafe_code)]

//! Conditional ANSI styling for reporter text.

use crossterm::style::{Color, Stylize};

/// Styling switch shared by renderers and reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self { enabled: false }
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.enabled
    }

    pub fn fg(self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn red(self, text: &str) -> String {
        self.fg(text, Color::Red)
    }

    pub fn green(self, text: &str) -> String {
        self.fg(text, Color::Green)
    }

    pub fn yellow(self, text: &str) -> String {
        self.fg(text, Color::Yellow)
    }

    pub fn blue(self, text: &str) -> String {
        self.fg(text, Color::Blue)
    }

    pub fn gray(self, text: &str) -> String {
        self.fg(text, Color::DarkGrey)
    }

    pub fn dim(self, text: &str) -> String {
        if self.enabled {
            text.dim().to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn bold(self, text: &str) -> String {
        if self.enabled {
            text.bold().to_string()
        } else {
            text.to_owned()
        }
    }

    /// Inverted badge (` RERUN `).
    pub fn badge(self, text: &str, color: Color) -> String {
        if self.enabled {
            format!(" {text} ").with(color).negative().bold().to_string()
        } else {
            text.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_palette_passes_text_through() {
        let p = Palette::plain();
        assert_eq!(p.red("x"), "x");
        assert_eq!(p.dim("y"), "y");
        assert_eq!(p.badge("RERUN", Color::Blue), "RERUN");
    }

    #[test]
    fn enabled_palette_emits_escapes() {
        let p = Palette::new(true);
        let red = p.red("x");
        assert!(red.contains('\x1b'));
        assert!(red.contains('x'));
        assert_ne!(p.bold("b"), "b");
    }
}
