//! Config command - manage configuration

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use litaudit_cli::config::{mask_secret, Backend, Config, KEYS};

#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit config                           Show effective configuration\n    \
    litaudit config set api_key <KEY>         Store the API key\n    \
    litaudit config set library_id 123456     Select the remote library\n    \
    litaudit config set mirror_path ~/Zotero/zotero.sqlite\n    \
    litaudit config get persona")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value (an empty value clears it)
    Set { key: String, value: String },
}

pub fn run(args: Args, offline: bool) -> Result<()> {
    match args.command {
        Some(ConfigCommand::Show) | None => show_config(offline),
        Some(ConfigCommand::Get { key }) => get_config(&key),
        Some(ConfigCommand::Set { key, value }) => set_config(&key, &value),
    }
}

fn show_config(offline: bool) -> Result<()> {
    let config = Config::load()?;

    println!("{}", "litaudit Configuration".bold());
    println!();
    println!("  {}  {}", "Config file:".dimmed(), Config::config_path()?.display());
    println!("  {}  {}", "Ledger:".dimmed(), config.ledger_path()?.display());
    println!();

    for key in KEYS {
        let value = match config.get(key)? {
            Some(v) if *key == "api_key" => mask_secret(&v),
            Some(v) => v,
            None => "(unset)".dimmed().to_string(),
        };
        println!("  {:<14} {}", format!("{key}:"), value);
    }

    println!();
    match config.backend(offline) {
        Ok(Backend::Remote {
            library_id,
            library_type,
            ..
        }) => println!(
            "{} remote {} library {}",
            "Backend:".bold(),
            library_type,
            library_id.cyan()
        ),
        Ok(Backend::Mirror { path }) => println!(
            "{} offline mirror {} {}",
            "Backend:".bold(),
            path.display(),
            "(read-only)".yellow()
        ),
        Err(e) => println!("{} {}", "Backend:".bold(), e.to_string().red()),
    }

    Ok(())
}

fn get_config(key: &str) -> Result<()> {
    let config = Config::load()?;
    match config.get(key)? {
        Some(value) => println!("{value}"),
        None => println!("{}", format!("Config key '{}' is not set", key).yellow()),
    }
    Ok(())
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let path = Config::config_path()?;
    // Only the file is updated; environment overrides are not persisted.
    let mut config = Config::load_from(&path)?;
    config.set(key, value)?;
    config
        .save_to(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    let shown = if key == "api_key" { mask_secret(value) } else { value.to_string() };
    println!("{} {} = {}", "Saved".green(), key.bold(), shown);
    Ok(())
}
