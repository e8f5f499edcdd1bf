//! Quality command - find items with incomplete metadata.

use anyhow::{Context, Result};
use colored::Colorize;

use litaudit_cli::maintenance::check_collection;

use crate::cli::format::print_json;
use crate::cli::{open_session, OutputFormat};

/// Arguments for the quality command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit quality Inbox                 Items missing an id, title, abstract or PDF\n    \
    litaudit quality Inbox --format json   Output as JSON")]
pub struct Args {
    /// Collection name
    #[arg(value_name = "COLLECTION")]
    pub collection: String,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the quality command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (_, gateway) = open_session(offline)?;

    let report = check_collection(gateway.as_ref(), &args.collection)
        .with_context(|| format!("Failed to check collection '{}'", args.collection))?
        .with_context(|| format!("Collection not found: {}", args.collection))?;

    if args.format == OutputFormat::Json {
        return print_json(&report);
    }

    println!(
        "{} ({} items)",
        format!("Metadata check: {}", report.collection).bold(),
        report.total_items
    );
    if report.is_complete() {
        println!("{}", "Every item has an identifier, title, abstract and PDF.".green());
        return Ok(());
    }

    for (label, keys) in [
        ("Missing identifier", &report.missing_identifier),
        ("Missing title", &report.missing_title),
        ("Missing abstract", &report.missing_abstract),
        ("Missing PDF", &report.missing_pdf),
        ("Not checked", &report.failed),
    ] {
        if keys.is_empty() {
            continue;
        }
        println!();
        println!("{} {}", format!("{label}:").yellow(), keys.len());
        for key in keys {
            println!("  {}", key.cyan());
        }
    }
    Ok(())
}
