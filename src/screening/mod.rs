//! Decision recording and pending-item discovery.
//!
//! Recording a decision performs several independent writes:
//!
//! 1. a child note embedding the [`AuditRecord`], the durable source of truth
//! 2. two fast-path tags, `phase:<phase>` and `<decision>:<codes>`
//! 3. optionally, one version-checked collection move
//!
//! Only step 1 decides whether the decision counts as recorded. Later steps
//! run even when an earlier one failed and never undo it, so a retried
//! decision may leave a second note or re-apply tags (at-least-once, not
//! atomic). A read-only or misconfigured backend aborts the whole call.

use serde::Serialize;

use crate::audit::record::{is_decision_tag, split_codes};
use crate::audit::{parse_note, AuditRecord, Decision};
use crate::gateway::{Gateway, GatewayError, LibraryItem, WriteOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ScreeningError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScreeningError::Gateway(e) if e.is_fatal())
    }
}

/// A decision to record for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub key: String,
    pub decision: Decision,
    pub codes: Vec<String>,
    pub reason: String,
    pub persona: String,
    pub phase: String,
    /// Collection name to remove the item from.
    pub source_collection: Option<String>,
    /// Collection name to add the item to.
    pub target_collection: Option<String>,
}

impl DecisionRequest {
    /// Builds a request; `codes` is a comma-separated list.
    pub fn new(key: &str, decision: Decision, codes: &str, persona: &str, phase: &str) -> Self {
        Self {
            key: key.to_string(),
            decision,
            codes: split_codes(codes),
            reason: String::new(),
            persona: persona.to_string(),
            phase: phase.to_string(),
            source_collection: None,
            target_collection: None,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = reason.to_string();
        self
    }

    /// Moves the item from `source` to `target` after recording.
    pub fn moving(mut self, source: &str, target: &str) -> Self {
        self.source_collection = Some(source.to_string());
        self.target_collection = Some(target.to_string());
        self
    }
}

/// Outcome of the tagging step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TagStatus {
    Applied,
    VersionConflict,
    ItemNotFound,
    Failed(String),
}

/// Outcome of the collection move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum MoveStatus {
    Moved,
    /// The item changed between the fetch and the write.
    VersionConflict,
    ItemNotFound,
    /// The named collection does not exist.
    CollectionNotFound(String),
    Failed(String),
}

/// What happened to each step of a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionReport {
    pub key: String,
    pub record: AuditRecord,
    /// Key of the created audit note.
    pub note_key: Option<String>,
    pub note_error: Option<String>,
    pub tags: TagStatus,
    pub movement: Option<MoveStatus>,
}

impl DecisionReport {
    /// Whether the audit note was written.
    pub fn is_recorded(&self) -> bool {
        self.note_key.is_some()
    }
}

/// How an item was classified by [`ScreeningService::classify_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    DecidedByTag,
    DecidedByNote,
    Pending,
}

/// Result of scanning a collection for undecided items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingScan {
    pub pending: Vec<LibraryItem>,
    pub decided_by_tag: usize,
    pub decided_by_note: usize,
    /// Items whose children could not be read.
    pub failed: usize,
}

impl PendingScan {
    pub fn decided(&self) -> usize {
        self.decided_by_tag + self.decided_by_note
    }
}

/// New collection set for a move: drop `source`, append `target` if absent.
pub fn move_membership(current: &[String], source: &str, target: &str) -> Vec<String> {
    let mut next: Vec<String> = current.iter().filter(|c| *c != source).cloned().collect();
    if !next.iter().any(|c| c == target) {
        next.push(target.to_string());
    }
    next
}

/// Passes recoverable errors through as data, raises fatal ones.
fn recoverable<T>(
    result: Result<T, GatewayError>,
) -> Result<Result<T, GatewayError>, ScreeningError> {
    match result {
        Err(e) if e.is_fatal() => Err(e.into()),
        other => Ok(other),
    }
}

/// Screening workflow over a single backend.
pub struct ScreeningService<'a> {
    gateway: &'a dyn Gateway,
}

impl<'a> ScreeningService<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self { gateway }
    }

    /// Records a decision. See the module docs for the write contract.
    pub fn record_decision(
        &self,
        request: &DecisionRequest,
    ) -> Result<DecisionReport, ScreeningError> {
        let record = AuditRecord::new(
            request.decision,
            request.codes.clone(),
            &request.reason,
            &request.persona,
            &request.phase,
        );
        let body = record.to_note_body()?;

        let created = recoverable(self.gateway.create_note(&request.key, &body))?;
        let (note_key, note_error) = match created {
            Ok(note_key) => {
                tracing::info!(
                    "Recorded {} for {} in note {}",
                    record.decision,
                    request.key,
                    note_key
                );
                (Some(note_key), None)
            }
            Err(e) => {
                tracing::warn!("Audit note for {} not written: {}", request.key, e);
                (None, Some(e.to_string()))
            }
        };

        let tags = self.apply_tags(&request.key, &record)?;

        let movement = match (&request.source_collection, &request.target_collection) {
            (Some(source), Some(target)) => Some(self.move_item(&request.key, source, target)?),
            _ => None,
        };

        Ok(DecisionReport {
            key: request.key.clone(),
            record,
            note_key,
            note_error,
            tags,
            movement,
        })
    }

    fn apply_tags(&self, key: &str, record: &AuditRecord) -> Result<TagStatus, ScreeningError> {
        let tags = [record.phase_tag(), record.decision_tag()];
        let status = match recoverable(self.gateway.add_tags(key, &tags))? {
            Ok(Some(WriteOutcome::Applied)) => TagStatus::Applied,
            Ok(Some(WriteOutcome::Conflict)) => TagStatus::VersionConflict,
            Ok(None) => TagStatus::ItemNotFound,
            Err(e) => TagStatus::Failed(e.to_string()),
        };
        if status != TagStatus::Applied {
            tracing::warn!("Tags for {} not applied: {:?}", key, status);
        }
        Ok(status)
    }

    /// Moves an item between two collections, both given by name.
    ///
    /// The item is fetched immediately before the write so the update is
    /// checked against its current version.
    pub fn move_item(
        &self,
        key: &str,
        source_name: &str,
        target_name: &str,
    ) -> Result<MoveStatus, ScreeningError> {
        let mut resolved = Vec::with_capacity(2);
        for name in [source_name, target_name] {
            match recoverable(self.gateway.get_collection_id_by_name(name))? {
                Ok(Some(collection_key)) => resolved.push(collection_key),
                Ok(None) => return Ok(MoveStatus::CollectionNotFound(name.to_string())),
                Err(e) => return Ok(MoveStatus::Failed(e.to_string())),
            }
        }
        let (source, target) = (&resolved[0], &resolved[1]);

        let item = match recoverable(self.gateway.get_item(key))? {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(MoveStatus::ItemNotFound),
            Err(e) => return Ok(MoveStatus::Failed(e.to_string())),
        };

        let collections = move_membership(&item.collections, source, target);
        let written =
            recoverable(self.gateway.update_item_collections(key, item.version, &collections))?;
        let status = match written {
            Ok(WriteOutcome::Applied) => MoveStatus::Moved,
            Ok(WriteOutcome::Conflict) => MoveStatus::VersionConflict,
            Err(e) => MoveStatus::Failed(e.to_string()),
        };
        tracing::debug!(
            "Move of {} from '{}' to '{}': {:?}",
            key,
            source_name,
            target_name,
            status
        );
        Ok(status)
    }

    /// Classifies one item: tags first, note bodies only on a miss.
    ///
    /// Children are never fetched for an item that carries a decision tag.
    pub fn classify_item(&self, item: &LibraryItem) -> Result<Classification, GatewayError> {
        if item.tags.iter().any(|t| is_decision_tag(t)) {
            return Ok(Classification::DecidedByTag);
        }

        let decided = self
            .gateway
            .get_item_children(&item.key)?
            .iter()
            .filter(|child| child.is_note())
            .any(|child| parse_note(child.note.as_deref().unwrap_or_default()).is_some());

        Ok(if decided {
            Classification::DecidedByNote
        } else {
            Classification::Pending
        })
    }

    /// Lists the top-level items of a collection that have no decision yet.
    pub fn get_pending_items(&self, collection_name: &str) -> Result<PendingScan, ScreeningError> {
        let collection_key = self
            .gateway
            .get_collection_id_by_name(collection_name)?
            .ok_or_else(|| ScreeningError::CollectionNotFound(collection_name.to_string()))?;

        let mut scan = PendingScan::default();
        for item in self.gateway.get_items_in_collection(&collection_key)? {
            if item.is_child() {
                continue;
            }
            match self.classify_item(&item) {
                Ok(Classification::DecidedByTag) => scan.decided_by_tag += 1,
                Ok(Classification::DecidedByNote) => scan.decided_by_note += 1,
                Ok(Classification::Pending) => scan.pending.push(item),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("Could not classify {}: {}", item.key, e);
                    scan.failed += 1;
                }
            }
        }

        tracing::info!(
            "Collection '{}': {} pending, {} decided ({} by tag, {} by note), {} failed",
            collection_name,
            scan.pending.len(),
            scan.decided(),
            scan.decided_by_tag,
            scan.decided_by_note,
            scan.failed
        );
        Ok(scan)
    }
}
