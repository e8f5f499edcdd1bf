//! Local resumable screening ledger.
//!
//! An append-only CSV file recording each decision made in a screening
//! session, independent of either backend. On load, the keys are rebuilt
//! into a set so "already screened" checks are O(1). A missing or
//! unreadable file yields an empty ledger instead of failing startup, and
//! bad rows are skipped without losing the rest.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::audit::Decision;
use crate::gateway::LibraryItem;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to write ledger: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode ledger row: {0}")]
    Csv(#[from] csv::Error),
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Decision")]
    pub decision: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Persona")]
    pub persona: String,
    #[serde(rename = "Phase")]
    pub phase: String,
}

impl LedgerEntry {
    /// Builds an entry stamped with the current time.
    pub fn new(key: &str, decision: Decision, code: &str, persona: &str, phase: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            key: key.to_string(),
            decision: decision.to_string(),
            code: code.to_string(),
            persona: persona.to_string(),
            phase: phase.to_string(),
        }
    }
}

pub struct ScreeningLedger {
    path: PathBuf,
    screened: HashSet<String>,
}

impl ScreeningLedger {
    /// Opens the ledger at `path`, rebuilding the set of screened keys.
    pub fn load(path: &Path) -> Self {
        let screened = match Self::read_keys(path) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable screening ledger {}: {}",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };
        tracing::debug!("Loaded {} screened keys from {}", screened.len(), path.display());
        Self {
            path: path.to_path_buf(),
            screened,
        }
    }

    fn read_keys(path: &Path) -> Result<HashSet<String>, csv::Error> {
        if !path.exists() {
            return Ok(HashSet::new());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut keys = HashSet::new();
        for row in reader.deserialize::<LedgerEntry>() {
            match row {
                Ok(entry) => {
                    keys.insert(entry.key);
                }
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    tracing::warn!(
                        "Stopped reading ledger {} after {} keys: {}",
                        path.display(),
                        keys.len(),
                        e
                    );
                    break;
                }
                Err(e) => tracing::debug!("Skipping unreadable ledger row: {}", e),
            }
        }
        Ok(keys)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_screened(&self, key: &str) -> bool {
        self.screened.contains(key)
    }

    pub fn len(&self) -> usize {
        self.screened.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screened.is_empty()
    }

    /// Appends an entry, writing the header only into a new or empty file.
    pub fn record(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;

        self.screened.insert(entry.key.clone());
        Ok(())
    }

    /// Drops items already present in the ledger.
    pub fn filter_pending(&self, items: Vec<LibraryItem>) -> Vec<LibraryItem> {
        items
            .into_iter()
            .filter(|item| !self.is_screened(&item.key))
            .collect()
    }
}
