//! Batch migration of audit notes across a collection.

use serde::Serialize;

use super::codec::{migrate_note, parse_note};
use super::AuditError;
use crate::gateway::{ensure_writable, Gateway, GatewayError, WriteOutcome};

/// Counters reported by [`migrate_collection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    /// Items visited.
    pub processed: usize,
    /// Notes rewritten (or that would be, in a dry run).
    pub migrated: usize,
    /// Audit notes already in canonical form.
    pub already_clean: usize,
    /// Notes that are not audit records.
    pub skipped: usize,
    /// Items whose children could not be read, and rejected or conflicting writes.
    pub failed: usize,
}

/// Rewrites every legacy audit note on the items of a collection.
///
/// Per-item problems are counted, never raised. Only an unknown collection
/// or a configuration error (including the read-only veto) aborts.
pub fn migrate_collection(
    gateway: &dyn Gateway,
    collection_name: &str,
    dry_run: bool,
) -> Result<MigrationStats, AuditError> {
    ensure_writable(gateway, "migrate")?;

    let collection_key = gateway
        .get_collection_id_by_name(collection_name)?
        .ok_or_else(|| AuditError::CollectionNotFound(collection_name.to_string()))?;

    let mut stats = MigrationStats::default();
    for item in gateway.get_items_in_collection(&collection_key)? {
        if item.is_child() {
            continue;
        }
        stats.processed += 1;

        let children = match gateway.get_item_children(&item.key) {
            Ok(children) => children,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Could not read children of {}: {}", item.key, e);
                stats.failed += 1;
                continue;
            }
        };

        for child in children.iter().filter(|c| c.is_note()) {
            let body = child.note.as_deref().unwrap_or_default();
            if parse_note(body).is_none() {
                stats.skipped += 1;
                continue;
            }
            let Some(migrated) = migrate_note(body) else {
                stats.already_clean += 1;
                continue;
            };

            if dry_run {
                tracing::debug!("Would migrate note {} on {}", child.key, item.key);
                stats.migrated += 1;
                continue;
            }

            if write(gateway, &child.key, child.version, &migrated)? {
                stats.migrated += 1;
            } else {
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        "Migration of '{}': {} items, {} migrated, {} clean, {} failed",
        collection_name,
        stats.processed,
        stats.migrated,
        stats.already_clean,
        stats.failed
    );
    Ok(stats)
}

/// Writes one migrated note; `Ok(false)` for a counted failure.
fn write(gateway: &dyn Gateway, key: &str, version: u64, body: &str) -> Result<bool, GatewayError> {
    match gateway.update_note(key, version, body) {
        Ok(WriteOutcome::Applied) => Ok(true),
        Ok(WriteOutcome::Conflict) => {
            tracing::warn!("Note {} changed during migration, left untouched", key);
            Ok(false)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("Failed to migrate note {}: {}", key, e);
            Ok(false)
        }
    }
}
