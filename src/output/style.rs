//! ANSI styling for the banner and run summary.
//!
//! Colors are decided once at startup and stored process-wide; the paint
//! helpers return plain text when they are off.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

static COLORS_ENABLED: AtomicBool = AtomicBool::new(false);

/// What the color decision depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorEnv {
    /// `--no-color` was passed.
    pub no_color_flag: bool,
    /// `NO_COLOR` is set to anything.
    pub no_color_var: bool,
    /// `TERM=dumb`.
    pub dumb_term: bool,
    /// `CLICOLOR_FORCE=1`.
    pub forced: bool,
    /// stderr is a terminal.
    pub terminal: bool,
}

impl ColorEnv {
    pub fn detect(no_color_flag: bool) -> Self {
        Self {
            no_color_flag,
            no_color_var: std::env::var_os("NO_COLOR").is_some(),
            dumb_term: std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb")),
            forced: std::env::var("CLICOLOR_FORCE").is_ok_and(|v| v == "1"),
            terminal: std::io::stderr().is_terminal(),
        }
    }

    /// Forcing wins; otherwise colors need a terminal and no opt-out.
    pub fn wants_color(self) -> bool {
        if self.forced {
            return true;
        }
        self.terminal && !self.no_color_flag && !self.no_color_var && !self.dumb_term
    }
}

pub fn configure(no_color: bool) {
    let enabled = ColorEnv::detect(no_color).wants_color();
    COLORS_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn colors_enabled() -> bool {
    COLORS_ENABLED.load(Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Bold,
    Dim,
    Red,
    Green,
    Yellow,
    Cyan,
    BrightCyan,
}

impl Tone {
    fn sgr(self) -> &'static str {
        match self {
            Tone::Bold => "1",
            Tone::Dim => "2",
            Tone::Red => "31",
            Tone::Green => "32",
            Tone::Yellow => "33",
            Tone::Cyan => "36",
            Tone::BrightCyan => "96",
        }
    }
}

fn paint(tone: Tone, text: &str) -> String {
    if text.is_empty() || !colors_enabled() {
        return text.to_string();
    }
    format!("\x1b[{}m{text}\x1b[0m", tone.sgr())
}

pub fn bold(text: &str) -> String {
    paint(Tone::Bold, text)
}

pub fn muted(text: &str) -> String {
    paint(Tone::Dim, text)
}

/// Scheme names.
pub fn accent(text: &str) -> String {
    paint(Tone::Cyan, text)
}

pub fn success(text: &str) -> String {
    paint(Tone::Green, text)
}

pub fn failure(text: &str) -> String {
    paint(Tone::Red, text)
}

pub fn warning(text: &str) -> String {
    paint(Tone::Yellow, text)
}

/// Durations and exit codes.
pub fn number(text: &str) -> String {
    paint(Tone::BrightCyan, text)
}
