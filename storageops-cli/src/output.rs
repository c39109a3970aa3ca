//! Output formatting for the CLI.
//!
//! Handles human-readable, table and JSON output formats.

use serde::Serialize;
use serde_json::json;
use tabled::{Table, Tabled};

use crate::OutputFormat;

/// Output handler for CLI commands.
pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    /// Create a new output handler.
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn is_table(&self) -> bool {
        self.format == OutputFormat::Table
    }

    /// Print a line to stdout (respects quiet mode).
    pub fn println(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print an info message. Always shown: summaries go through here.
    pub fn info(&self, msg: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({"type": "info", "message": msg})),
            _ => println!("{}", msg),
        }
    }

    /// Print a success message (green in human format).
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            match self.format {
                OutputFormat::Json => println!("{}", json!({"type": "success", "message": msg})),
                _ => println!("\x1b[32m{}\x1b[0m", msg),
            }
        }
    }

    /// Print an error message (red in human format, always shown).
    pub fn error(&self, msg: &str) {
        match self.format {
            OutputFormat::Json => eprintln!("{}", json!({"type": "error", "message": msg})),
            _ => eprintln!("\x1b[31m{}\x1b[0m", msg),
        }
    }

    /// Print a serializable value as pretty JSON.
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => self.error(&format!("failed to serialize output: {}", e)),
        }
    }

    /// Print rows as a table.
    pub fn table<T: Tabled>(&self, rows: &[T]) {
        println!("{}", render_table(rows));
    }
}

pub fn render_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).to_string()
}
