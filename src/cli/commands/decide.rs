//! Decide command - record a screening decision for one item.
//!
//! Writes the audit note, applies the fast-path tags, optionally moves the
//! item between collections, and appends the decision to the local ledger.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use litaudit_cli::audit::Decision;
use litaudit_cli::ledger::{LedgerEntry, ScreeningLedger};
use litaudit_cli::screening::{
    DecisionReport, DecisionRequest, MoveStatus, ScreeningService, TagStatus,
};

use crate::cli::format::print_json;
use crate::cli::{open_session, OutputFormat};

/// Arguments for the decide command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit decide ABCD1234 --decision include --code IC1\n    \
    litaudit decide ABCD1234 --decision exclude --code EC1,EC3 --reason \"Wrong population\"\n    \
    litaudit decide ABCD1234 -d exclude -c EC2 --from Inbox --to Excluded")]
pub struct Args {
    /// Key of the item being screened
    #[arg(value_name = "KEY")]
    pub key: String,

    /// accepted|rejected (include/exclude also accepted)
    #[arg(short, long, value_name = "DECISION")]
    pub decision: Decision,

    /// Criteria codes, comma separated
    #[arg(short, long, value_name = "CODES")]
    pub code: String,

    /// Free-text justification
    #[arg(short, long, default_value = "")]
    pub reason: String,

    /// Reviewer persona (defaults to the configured persona)
    #[arg(long)]
    pub persona: Option<String>,

    /// Review phase (defaults to the configured phase, then title_abstract)
    #[arg(long)]
    pub phase: Option<String>,

    /// Collection to remove the item from
    #[arg(long, value_name = "NAME", requires = "to")]
    pub from: Option<String>,

    /// Collection to move the item into
    #[arg(long, value_name = "NAME", requires = "from")]
    pub to: Option<String>,

    /// Do not append the decision to the local ledger
    #[arg(long)]
    pub no_ledger: bool,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the decide command.
pub fn run(args: Args, offline: bool) -> Result<()> {
    let (config, gateway) = open_session(offline)?;

    let persona = args
        .persona
        .or_else(|| config.persona.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let phase = args
        .phase
        .or_else(|| config.phase.clone())
        .unwrap_or_else(|| "title_abstract".to_string());

    let mut request = DecisionRequest::new(&args.key, args.decision, &args.code, &persona, &phase)
        .with_reason(&args.reason);
    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        request = request.moving(from, to);
    }
    if request.codes.is_empty() {
        bail!("At least one criteria code is required");
    }

    let report = ScreeningService::new(gateway.as_ref())
        .record_decision(&request)
        .with_context(|| format!("Failed to record decision for {}", args.key))?;

    if report.is_recorded() && !args.no_ledger {
        let mut ledger = ScreeningLedger::load(&config.ledger_path()?);
        ledger
            .record(&LedgerEntry::new(
                &args.key,
                args.decision,
                &args.code,
                &persona,
                &phase,
            ))
            .with_context(|| format!("Failed to append to ledger {}", ledger.path().display()))?;
    }

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }

    if !report.is_recorded() {
        bail!(
            "Decision for {} was not recorded: {}",
            args.key,
            report.note_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_report(report: &DecisionReport) {
    let decision = match report.record.decision {
        Decision::Accepted => report.record.decision.to_string().green(),
        Decision::Rejected => report.record.decision.to_string().red(),
    };
    println!(
        "{} {} ({})",
        report.key.cyan(),
        decision,
        report.record.reason_code.join(", ")
    );

    match &report.note_key {
        Some(key) => println!("  {}  {}", "Note:".dimmed(), key),
        None => println!(
            "  {}  {}",
            "Note:".dimmed(),
            report.note_error.as_deref().unwrap_or("not written").red()
        ),
    }

    let tags = match &report.tags {
        TagStatus::Applied => "applied".green(),
        TagStatus::VersionConflict => "version conflict, not applied".yellow(),
        TagStatus::ItemNotFound => "item not found".red(),
        TagStatus::Failed(reason) => format!("failed: {reason}").red(),
    };
    println!("  {}  {}", "Tags:".dimmed(), tags);

    if let Some(movement) = &report.movement {
        let status = match movement {
            MoveStatus::Moved => "moved".green(),
            MoveStatus::VersionConflict => "item changed concurrently, not moved".yellow(),
            MoveStatus::ItemNotFound => "item not found".red(),
            MoveStatus::CollectionNotFound(name) => format!("collection '{name}' not found").red(),
            MoveStatus::Failed(reason) => format!("failed: {reason}").red(),
        };
        println!("  {}  {}", "Move:".dimmed(), status);
    }
}
