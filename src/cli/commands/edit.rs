//! Edit command - correct fields of a recorded audit entry.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::Value;

use litaudit_cli::audit::{edit_entry, EditOutcome, FieldChange, Payload};

use crate::cli::format::print_json;
use crate::cli::{open_session, OutputFormat};

/// Arguments for the edit command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit edit ABCD1234 --persona p1 --phase title_abstract --set decision=rejected --dry-run\n    \
    litaudit edit ABCD1234 --persona p1 --phase full_text --set 'reason_code=[\"EC2\"]'")]
pub struct Args {
    /// Item key
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Persona that recorded the entry
    #[arg(long)]
    pub persona: String,

    /// Phase of the entry
    #[arg(long)]
    pub phase: String,

    /// Field to change, as FIELD=VALUE (repeatable)
    #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
    #[arg(
        long_help = "Field to change, as FIELD=VALUE. VALUE is parsed as JSON when\n\
        possible (lists, numbers), otherwise stored as a string."
    )]
    pub updates: Vec<String>,

    /// Show the change without writing it
    #[arg(long)]
    pub dry_run: bool,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Parses `FIELD=VALUE` pairs into an update payload.
fn parse_updates(pairs: &[String]) -> Result<Payload> {
    let mut updates = Payload::new();
    for pair in pairs {
        let Some((field, value)) = pair.split_once('=') else {
            bail!("Invalid update '{}': expected FIELD=VALUE", pair);
        };
        let field = field.trim();
        if field.is_empty() {
            bail!("Invalid update '{}': empty field name", pair);
        }
        let value = match serde_json::from_str::<Value>(value) {
            Ok(v @ (Value::Array(_) | Value::Object(_) | Value::Number(_) | Value::Bool(_))) => v,
            _ => Value::String(value.to_string()),
        };
        updates.insert(field.to_string(), value);
    }
    Ok(updates)
}

/// Executes the edit command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let updates = parse_updates(&args.updates)?;
    let (_, gateway) = open_session(offline)?;

    let outcome = edit_entry(
        gateway.as_ref(),
        &args.key,
        &args.persona,
        &args.phase,
        &updates,
        args.dry_run,
    )
    .with_context(|| format!("Failed to edit audit entry on {}", args.key))?;

    if args.format == OutputFormat::Json {
        print_json(&outcome)?;
    } else {
        match &outcome {
            EditOutcome::Updated { note_key, changes } => {
                println!("{}", format!("Updated note {}", note_key).green());
                print_changes(changes);
            }
            EditOutcome::Preview { note_key, changes } => {
                println!("{}", format!("[dry run] Would update note {}", note_key).yellow());
                print_changes(changes);
            }
            EditOutcome::NoMatch => {}
            EditOutcome::Conflict { note_key } => {
                println!("{}", format!("Note {} changed concurrently; nothing written", note_key).yellow());
            }
        }
    }

    if outcome == EditOutcome::NoMatch {
        bail!(
            "No audit entry on {} for persona '{}' and phase '{}'",
            args.key,
            args.persona,
            args.phase
        );
    }
    Ok(())
}

fn print_changes(changes: &[FieldChange]) {
    if changes.is_empty() {
        println!("  {}", "(no fields changed)".dimmed());
    }
    for change in changes {
        let before = change
            .before
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "(unset)".to_string());
        println!("  {}: {} -> {}", change.field.bold(), before.dimmed(), change.after);
    }
}
