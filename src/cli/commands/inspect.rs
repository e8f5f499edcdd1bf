//! Inspect command - show the audit entries recorded on an item.

use anyhow::{Context, Result};
use colored::Colorize;

use litaudit_cli::audit::{inspect_item, AuditEntry};

use crate::cli::format::{print_json, truncate};
use crate::cli::{open_session, OutputFormat};

/// Arguments for the inspect command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit inspect ABCD1234\n    \
    litaudit inspect ABCD1234 --format json")]
pub struct Args {
    /// Item key
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the inspect command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (_, gateway) = open_session(offline)?;
    let entries = inspect_item(gateway.as_ref(), &args.key)
        .with_context(|| format!("Failed to read notes of {}", args.key))?;

    if args.format == OutputFormat::Json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("{}", format!("No audit entries on {}.", args.key).dimmed());
        return Ok(());
    }

    println!("{}", format!("Audit entries for {}", args.key).bold());
    println!();
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &AuditEntry) {
    let decision = entry.decision().unwrap_or("n/a");
    let decision = if decision == "accepted" {
        decision.green()
    } else {
        decision.red()
    };

    let mut reason = entry.reason_codes().join(", ");
    if let Some(text) = entry.reason_text().filter(|t| !t.is_empty()) {
        reason.push_str(&format!(" ({})", truncate(text, 40)));
    }

    println!(
        "  {} {}  {}",
        entry.note_key.cyan(),
        decision,
        reason
    );
    println!(
        "      {} {}  {} {}  {} {}  {}",
        "persona".dimmed(),
        entry.persona().unwrap_or("n/a"),
        "phase".dimmed(),
        entry.phase().unwrap_or("n/a"),
        "schema".dimmed(),
        entry.audit_version().unwrap_or("n/a"),
        entry.timestamp().unwrap_or("").dimmed()
    );
}
