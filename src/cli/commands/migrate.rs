//! Migrate command - bring legacy audit notes of a collection up to date.

use anyhow::{Context, Result};
use colored::Colorize;

use litaudit_cli::audit::{migrate_collection, AUDIT_VERSION};

use crate::cli::format::print_json;
use crate::cli::{open_session, OutputFormat};

/// Arguments for the migrate command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit migrate Inbox --dry-run    Count notes that would be rewritten\n    \
    litaudit migrate Inbox              Rewrite legacy notes in place")]
pub struct Args {
    /// Collection name
    #[arg(value_name = "COLLECTION")]
    pub collection: String,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the migrate command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (_, gateway) = open_session(offline)?;

    let stats = migrate_collection(gateway.as_ref(), &args.collection, args.dry_run)
        .with_context(|| format!("Failed to migrate collection '{}'", args.collection))?;

    match args.format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Text => {
            let heading = if args.dry_run {
                format!("Dry run: audit notes in '{}' (target schema {})", args.collection, AUDIT_VERSION)
            } else {
                format!("Migrated audit notes in '{}' to schema {}", args.collection, AUDIT_VERSION)
            };
            println!("{}", heading.bold());
            println!("  {}  {}", "Items processed:".dimmed(), stats.processed);
            let label = if args.dry_run { "Would migrate:" } else { "Migrated:" };
            println!("  {}  {}", label.dimmed(), stats.migrated.to_string().green());
            println!("  {}  {}", "Already clean:".dimmed(), stats.already_clean);
            println!("  {}  {}", "Other notes:".dimmed(), stats.skipped);
            if stats.failed > 0 {
                println!("  {}  {}", "Failed:".dimmed(), stats.failed.to_string().red());
            }
        }
    }
    Ok(())
}
