//! Output helpers shared by the commands.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// How a command prints its result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored tables and summaries for a terminal.
    #[default]
    Text,
    /// Pretty-printed JSON for scripts.
    Json,
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncates a string to at most `max_chars` characters, appending "...".
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let head: String = s.chars().take(max_chars - 3).collect();
    format!("{head}...")
}
