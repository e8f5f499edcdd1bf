//! Reading and surgically editing the audit entries of a single item.

use serde::Serialize;
use serde_json::Value;

use super::codec::{parse_note, Payload};
use super::record::wrap_payload;
use super::AuditError;
use crate::gateway::{ensure_writable, Gateway, WriteOutcome};

/// An audit record found on an item, with the note that carries it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub note_key: String,
    pub note_version: u64,
    pub payload: Payload,
}

impl AuditEntry {
    fn text(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    pub fn decision(&self) -> Option<&str> {
        self.text("decision")
    }

    pub fn persona(&self) -> Option<&str> {
        self.text("persona")
    }

    pub fn phase(&self) -> Option<&str> {
        self.text("phase")
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.text("timestamp")
    }

    pub fn reason_text(&self) -> Option<&str> {
        self.text("reason_text")
    }

    pub fn audit_version(&self) -> Option<&str> {
        self.text("audit_version").or_else(|| self.text("sdb_version"))
    }

    /// Reason codes, accepting both list and legacy string forms.
    pub fn reason_codes(&self) -> Vec<String> {
        match self.payload.get("reason_code").or_else(|| self.payload.get("code")) {
            Some(Value::Array(codes)) => codes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(codes)) => super::record::split_codes(codes),
            _ => Vec::new(),
        }
    }
}

/// One field rewritten by an edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<Value>,
    pub after: Value,
}

/// Result of [`edit_entry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    /// The note was rewritten.
    Updated { note_key: String, changes: Vec<FieldChange> },
    /// Dry run: nothing was written.
    Preview { note_key: String, changes: Vec<FieldChange> },
    /// No entry matches the persona/phase pair.
    NoMatch,
    /// The note changed since it was read.
    Conflict { note_key: String },
}

/// Lists every valid audit entry on an item.
pub fn inspect_item(gateway: &dyn Gateway, key: &str) -> Result<Vec<AuditEntry>, AuditError> {
    let entries = gateway
        .get_item_children(key)?
        .into_iter()
        .filter(|child| child.is_note())
        .filter_map(|child| {
            let payload = parse_note(child.note.as_deref().unwrap_or_default())?;
            Some(AuditEntry {
                note_key: child.key,
                note_version: child.version,
                payload,
            })
        })
        .collect();
    Ok(entries)
}

/// Rewrites the entry of `key` recorded by `persona` during `phase`.
///
/// `updates` replace fields of the stored payload; `null` values are
/// ignored. Refuses to run on a read-only backend, dry run or not.
pub fn edit_entry(
    gateway: &dyn Gateway,
    key: &str,
    persona: &str,
    phase: &str,
    updates: &Payload,
    dry_run: bool,
) -> Result<EditOutcome, AuditError> {
    ensure_writable(gateway, "edit")?;

    let Some(entry) = inspect_item(gateway, key)?
        .into_iter()
        .find(|e| e.persona() == Some(persona) && e.phase() == Some(phase))
    else {
        tracing::info!("No audit entry for persona '{}' and phase '{}' on {}", persona, phase, key);
        return Ok(EditOutcome::NoMatch);
    };

    let mut payload = entry.payload.clone();
    let mut changes = Vec::new();
    for (field, value) in updates {
        if value.is_null() {
            continue;
        }
        let before = payload.insert(field.clone(), value.clone());
        if before.as_ref() != Some(value) {
            changes.push(FieldChange {
                field: field.clone(),
                before,
                after: value.clone(),
            });
        }
    }

    if dry_run {
        return Ok(EditOutcome::Preview {
            note_key: entry.note_key,
            changes,
        });
    }

    let body = wrap_payload(&serde_json::to_string(&payload)?);
    match gateway.update_note(&entry.note_key, entry.note_version, &body)? {
        WriteOutcome::Applied => {
            tracing::info!("Updated audit entry in note {}", entry.note_key);
            Ok(EditOutcome::Updated {
                note_key: entry.note_key,
                changes,
            })
        }
        WriteOutcome::Conflict => Ok(EditOutcome::Conflict {
            note_key: entry.note_key,
        }),
    }
}
