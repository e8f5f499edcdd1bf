//! Pending command - list items of a collection without a decision.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use litaudit_cli::gateway::LibraryItem;
use litaudit_cli::ledger::ScreeningLedger;
use litaudit_cli::screening::ScreeningService;

use crate::cli::format::{print_json, truncate};
use crate::cli::{open_session, OutputFormat};

/// Arguments for the pending command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit pending Inbox                 Items in 'Inbox' with no decision\n    \
    litaudit pending Inbox --resume        Also skip items in the local ledger\n    \
    litaudit pending Inbox --format json   Output as JSON")]
pub struct Args {
    /// Collection name
    #[arg(value_name = "COLLECTION")]
    pub collection: String,

    /// Also skip items already recorded in the local ledger
    #[arg(long)]
    pub resume: bool,

    /// Maximum number of items to display
    #[arg(short, long, value_name = "N")]
    pub limit: Option<usize>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct PendingOutput<'a> {
    collection: &'a str,
    pending: &'a [LibraryItem],
    decided_by_tag: usize,
    decided_by_note: usize,
    skipped_by_ledger: usize,
    failed: usize,
}

/// Executes the pending command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (config, gateway) = open_session(offline)?;

    let scan = ScreeningService::new(gateway.as_ref())
        .get_pending_items(&args.collection)
        .with_context(|| format!("Failed to scan collection '{}'", args.collection))?;

    let found = scan.pending.len();
    let mut pending = if args.resume {
        ScreeningLedger::load(&config.ledger_path()?).filter_pending(scan.pending.clone())
    } else {
        scan.pending.clone()
    };
    let skipped_by_ledger = found - pending.len();
    if let Some(limit) = args.limit {
        pending.truncate(limit);
    }

    match args.format {
        OutputFormat::Json => print_json(&PendingOutput {
            collection: &args.collection,
            pending: &pending,
            decided_by_tag: scan.decided_by_tag,
            decided_by_note: scan.decided_by_note,
            skipped_by_ledger,
            failed: scan.failed,
        })?,
        OutputFormat::Text => {
            if pending.is_empty() {
                println!("{}", format!("No pending items in '{}'.", args.collection).dimmed());
            } else {
                println!("{}", format!("{:<10}  {:<6}  {}", "KEY", "PDF", "TITLE").bold());
                for item in &pending {
                    let pdf = if item.has_pdf { "yes".green() } else { "no".dimmed() };
                    println!(
                        "{:<10}  {:<6}  {}",
                        item.key.cyan(),
                        pdf,
                        truncate(item.title.as_deref().unwrap_or("(untitled)"), 70)
                    );
                }
            }
            println!();
            println!(
                "{} pending, {} decided ({} by tag, {} by note){}",
                found.to_string().bold(),
                scan.decided(),
                scan.decided_by_tag,
                scan.decided_by_note,
                if skipped_by_ledger > 0 {
                    format!(", {skipped_by_ledger} already in ledger")
                } else {
                    String::new()
                }
            );
            if scan.failed > 0 {
                println!(
                    "{}",
                    format!("{} items could not be checked", scan.failed).yellow()
                );
            }
        }
    }
    Ok(())
}
