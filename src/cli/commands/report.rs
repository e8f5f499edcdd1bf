//! Report command - screening outcome counts for a collection.

use anyhow::{Context, Result};
use colored::Colorize;

use litaudit_cli::audit::screening_report;

use crate::cli::format::print_json;
use crate::cli::{open_session, OutputFormat};

/// Arguments for the report command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit report Inbox                  Accepted/rejected counts per code\n    \
    litaudit report Inbox --format json    Output as JSON")]
pub struct Args {
    /// Collection name
    #[arg(value_name = "COLLECTION")]
    pub collection: String,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the report command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (_, gateway) = open_session(offline)?;

    let report = screening_report(gateway.as_ref(), &args.collection)
        .with_context(|| format!("Failed to build report for '{}'", args.collection))?;

    if args.format == OutputFormat::Json {
        return print_json(&report);
    }

    println!("{}", format!("Screening report: {}", report.collection).bold());
    println!();
    println!("  {:<16} {}", "Items:".dimmed(), report.total_items);
    println!("  {:<16} {}", "Screened:".dimmed(), report.screened_items);
    println!("  {:<16} {}", "Accepted:".dimmed(), report.accepted_items.to_string().green());
    println!("  {:<16} {}", "Rejected:".dimmed(), report.rejected_items.to_string().red());
    println!("  {:<16} {}", "Pending:".dimmed(), report.pending_items());

    if !report.rejections_by_code.is_empty() {
        println!();
        println!("{}", "Rejections by code".bold());
        for (code, count) in &report.rejections_by_code {
            println!("  {:<16} {}", code.cyan(), count);
        }
    }

    if !report.malformed_notes.is_empty() {
        println!();
        println!(
            "{} {}",
            "Malformed audit notes on:".yellow(),
            report.malformed_notes.join(", ")
        );
    }
    if report.failed > 0 {
        println!("{}", format!("{} items could not be read", report.failed).yellow());
    }
    Ok(())
}
