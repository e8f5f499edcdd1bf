//! Purge command - bulk-remove notes, tags or attachments.
//!
//! Refused outright on the offline mirror, including dry runs.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use litaudit_cli::maintenance::{PurgeService, PurgeStats};

use crate::cli::format::print_json;
use crate::cli::{open_session, OutputFormat};

/// Arguments for the purge command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit purge notes --collection Inbox --audit-only --dry-run\n    \
    litaudit purge notes ABCD1234 --phase full_text\n    \
    litaudit purge tags --collection Inbox --tag phase:title_abstract\n    \
    litaudit purge attachments ABCD1234 EFGH5678")]
pub struct Args {
    #[command(subcommand)]
    pub command: PurgeCommand,
}

/// Item selection shared by every purge target.
#[derive(clap::Args)]
pub struct Targets {
    /// Item keys to purge
    #[arg(value_name = "KEY")]
    pub keys: Vec<String>,

    /// Purge every item of this collection
    #[arg(long, value_name = "NAME", conflicts_with = "keys")]
    pub collection: Option<String>,

    /// Count matches without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum PurgeCommand {
    /// Delete child notes
    Notes {
        #[command(flatten)]
        targets: Targets,

        /// Only delete notes carrying an audit record
        #[arg(long)]
        audit_only: bool,

        /// Only delete audit notes of this phase
        #[arg(long)]
        phase: Option<String>,
    },
    /// Remove one tag, or all tags
    Tags {
        #[command(flatten)]
        targets: Targets,

        /// Tag to remove (all tags when omitted)
        #[arg(long)]
        tag: Option<String>,
    },
    /// Delete child attachments
    Attachments {
        #[command(flatten)]
        targets: Targets,
    },
}

impl PurgeCommand {
    fn targets(&self) -> &Targets {
        match self {
            PurgeCommand::Notes { targets, .. }
            | PurgeCommand::Tags { targets, .. }
            | PurgeCommand::Attachments { targets } => targets,
        }
    }
}

/// Executes the purge command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (_, gateway) = open_session(offline)?;
    let service = PurgeService::new(gateway.as_ref());
    let targets = args.command.targets();

    let keys = match &targets.collection {
        Some(name) => service
            .collection_keys(name)?
            .with_context(|| format!("Collection not found: {name}"))?,
        None if targets.keys.is_empty() => bail!("Give item keys or --collection"),
        None => targets.keys.clone(),
    };

    let stats = match &args.command {
        PurgeCommand::Notes {
            audit_only, phase, ..
        } => service.purge_notes(&keys, *audit_only, phase.as_deref(), targets.dry_run)?,
        PurgeCommand::Tags { tag, .. } => service.purge_tags(&keys, tag.as_deref(), targets.dry_run)?,
        PurgeCommand::Attachments { .. } => service.purge_attachments(&keys, targets.dry_run)?,
    };

    match targets.format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Text => print_stats(&stats, keys.len(), targets.dry_run),
    }
    Ok(())
}

fn print_stats(stats: &PurgeStats, items: usize, dry_run: bool) {
    if dry_run {
        println!(
            "{}",
            format!("[dry run] {} objects on {} items would be removed", stats.skipped, items).yellow()
        );
    } else {
        println!(
            "{}",
            format!("Removed {} objects from {} items", stats.deleted, items).green()
        );
    }
    if stats.errors > 0 {
        println!("{}", format!("{} errors, see log for details", stats.errors).red());
    }
}
