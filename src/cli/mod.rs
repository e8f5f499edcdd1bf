//! Command-line interface for litaudit.
//!
//! Provides the commands for recording screening decisions, finding
//! undecided items, and auditing or cleaning up decision notes.

use anyhow::{Context, Result};

use litaudit_cli::config::Config;
use litaudit_cli::gateway::{open_gateway, Gateway};

/// Individual CLI command implementations.
pub mod commands;

/// Output formatting utilities.
pub mod format;

pub use format::OutputFormat;

/// Loads the configuration and opens the session's single backend.
pub fn open_session(offline: bool) -> Result<(Config, Box<dyn Gateway>)> {
    let config = Config::load().context("Failed to load configuration")?;
    let backend = config.backend(offline)?;
    let gateway = open_gateway(&backend).context("Failed to open library backend")?;
    tracing::debug!("Session backend: {}", gateway.kind());
    Ok((config, gateway))
}
