//! Terminal output for subcommands
//!
//! Human output prints status lines to stdout and problems to stderr.
//! With `--json`, results are pretty-printed documents on stdout, warnings
//! and errors become one-line `{"level", "message"}` objects on stderr,
//! and plain progress lines are dropped.

use std::io::{self, Write};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Success,
    Info,
    Warn,
    Error,
}

impl Level {
    fn name(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warn => "warning",
            Level::Error => "error",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Level::Warn | Level::Error)
    }
}

/// Prints command results in the selected format
///
/// `quiet` silences human success and info lines only; warnings, errors
/// and JSON documents are always printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn success(&self, message: &str) {
        self.emit(Level::Success, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    /// Prints a result document on stdout
    pub fn print_json(&self, value: &serde_json::Value) {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        let _ = writeln!(io::stdout().lock(), "{text}");
    }

    fn emit(&self, level: Level, message: &str) {
        let Some(line) = self.render(level, message) else {
            return;
        };
        // A closed pipe is not worth failing a sync over
        let _ = if level.to_stderr() {
            writeln!(io::stderr().lock(), "{line}")
        } else {
            writeln!(io::stdout().lock(), "{line}")
        };
    }

    /// The line printed for `message`, `None` when it is suppressed
    fn render(&self, level: Level, message: &str) -> Option<String> {
        match (self.format, level) {
            (OutputFormat::Human, Level::Success | Level::Info) if self.quiet => None,
            (OutputFormat::Human, Level::Success) => Some(format!("\u{2713} {message}")),
            (OutputFormat::Human, Level::Info) => Some(format!("  {message}")),
            (OutputFormat::Human, Level::Warn) => Some(format!("\u{26a0} Warning: {message}")),
            (OutputFormat::Human, Level::Error) => Some(format!("\u{2717} Error: {message}")),
            (OutputFormat::Json, Level::Info) => None,
            (OutputFormat::Json, level) => Some(
                serde_json::json!({ "level": level.name(), "message": message }).to_string(),
            ),
        }
    }
}
