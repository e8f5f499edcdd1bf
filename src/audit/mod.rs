//! Screening audit records.
//!
//! Every decision is persisted as a child note whose body embeds a JSON
//! record (the "SDB" format). This module owns the record shape, the
//! codec that finds records in arbitrary note bodies, migration of legacy
//! records, per-item inspection and editing, and collection reports.

pub mod codec;
pub mod inspect;
pub mod migration;
pub mod record;
pub mod report;

pub use codec::{extract_payload, migrate_note, migrate_payload, parse_note, CodecError, Payload};
pub use inspect::{edit_entry, inspect_item, AuditEntry, EditOutcome, FieldChange};
pub use migration::{migrate_collection, MigrationStats};
pub use record::{AuditRecord, Decision};
pub use report::{screening_report, ScreeningReport};

use crate::gateway::GatewayError;

/// Current schema version of audit records.
pub const AUDIT_VERSION: &str = "1.1";

/// Tool identity written into the `agent` field.
pub const CANONICAL_AGENT: &str = "litaudit";

/// Historical spellings of our own identity, normalized without being
/// mistaken for a persona.
pub const TOOL_VARIANTS: &[&str] = &["litaudit-tui", "litaudit-agent"];

/// Value of the `action` marker.
pub const SCREENING_ACTION: &str = "screening_decision";

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to encode audit payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AuditError {
    /// Whether the error came from a configuration problem or read-only veto.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::Gateway(e) if e.is_fatal())
    }
}
