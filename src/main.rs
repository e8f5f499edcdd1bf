use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::commands;

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "litaudit")]
#[command(version)]
#[command(about = "Record and audit systematic-review screening decisions")]
#[command(long_about = "litaudit records inclusion/exclusion decisions against a versioned\n\
    reference library. Each decision is stored as an audit note on the item,\n\
    mirrored by fast-lookup tags, and optionally moves the item between\n\
    collections under version control.\n\n\
    A session uses either the remote library (read/write) or a local\n\
    snapshot of it (read-only, selected with --offline or mirror_path).")]
#[command(after_help = "EXAMPLES:\n    \
    litaudit pending Inbox                              List undecided items\n    \
    litaudit decide KEY -d include -c IC1               Record an inclusion\n    \
    litaudit decide KEY -d exclude -c EC2 --from Inbox --to Excluded\n    \
    litaudit inspect KEY                                Show recorded decisions\n    \
    litaudit report Inbox                               Accepted/rejected counts\n    \
    litaudit migrate Inbox --dry-run                    Preview note migration\n    \
    litaudit config set api_key <KEY>                   Configure credentials\n\n\
    For more information about a command, run 'litaudit <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the offline mirror even when remote credentials are configured
    #[arg(long, global = true)]
    offline: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Record a screening decision for an item
    #[command(long_about = "Writes an audit note on the item, applies the phase and decision\n\
        tags, and optionally moves the item from one collection to another.\n\
        The decision counts as recorded only if the note was written; tags\n\
        and the move are attempted regardless and reported separately.")]
    Decide(commands::decide::Args),

    /// List items of a collection that have no decision yet
    #[command(long_about = "Checks each item's tags first and only reads child notes for\n\
        items without a decision tag.")]
    Pending(commands::pending::Args),

    /// Migrate legacy audit notes of a collection to the current schema
    Migrate(commands::migrate::Args),

    /// Show the audit entries recorded on an item
    Inspect(commands::inspect::Args),

    /// Correct fields of a recorded audit entry
    Edit(commands::edit::Args),

    /// Count screening outcomes of a collection from its audit notes
    Report(commands::report::Args),

    /// List items of a collection with missing identifier, title, abstract or PDF
    Quality(commands::quality::Args),

    /// Bulk-remove notes, tags or attachments (remote library only)
    Purge(commands::purge::Args),

    /// View and manage configuration settings
    #[command(long_about = "Provides subcommands to show, get, and set configuration values.\n\
        Configuration is stored in ~/.litaudit/config.yaml; LITAUDIT_*\n\
        environment variables override it.")]
    Config(commands::config::Args),

    /// Generate shell completion scripts
    Completions(commands::completions::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "litaudit=debug,litaudit_cli=debug"
    } else {
        "litaudit=info,litaudit_cli=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let offline = cli.offline;
    match cli.command {
        Commands::Decide(args) => commands::decide::run(args, offline),
        Commands::Pending(args) => commands::pending::run(args, offline),
        Commands::Migrate(args) => commands::migrate::run(args, offline),
        Commands::Inspect(args) => commands::inspect::run(args, offline),
        Commands::Edit(args) => commands::edit::run(args, offline),
        Commands::Report(args) => commands::report::run(args, offline),
        Commands::Quality(args) => commands::quality::run(args, offline),
        Commands::Purge(args) => commands::purge::run(args, offline),
        Commands::Config(args) => commands::config::run(args, offline),
        Commands::Completions(args) => {
            commands::completions::generate_completions(&mut Cli::command(), args.shell);
            Ok(())
        }
    }
}
