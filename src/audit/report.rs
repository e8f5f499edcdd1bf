//! Screening statistics for a collection, read back from audit notes.
//!
//! Counts come from the notes alone, never from tags, so the report reflects
//! what was durably recorded. When an item carries several audit notes the
//! newest one by timestamp decides it.

use std::collections::BTreeMap;

use serde::Serialize;

use super::codec::{extract_payload, CodecError};
use super::inspect::AuditEntry;
use super::{AuditError, Decision};
use crate::gateway::{ChildItem, Gateway};

/// Outcome counts for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScreeningReport {
    pub collection: String,
    /// Top-level items in the collection.
    pub total_items: usize,
    /// Items with at least one audit note.
    pub screened_items: usize,
    pub accepted_items: usize,
    pub rejected_items: usize,
    /// Rejected items per exclusion code. An item rejected under several
    /// codes counts once for each.
    pub rejections_by_code: BTreeMap<String, usize>,
    /// Keys of items carrying a note whose embedded JSON does not parse.
    pub malformed_notes: Vec<String>,
    /// Items whose children could not be read.
    pub failed: usize,
}

impl ScreeningReport {
    /// Items that were read and carry no audit note.
    pub fn pending_items(&self) -> usize {
        self.total_items
            .saturating_sub(self.screened_items)
            .saturating_sub(self.failed)
    }
}

/// Builds the screening report of a collection.
///
/// Works on either backend. Unreadable items are counted in `failed`; only
/// an unknown collection or a configuration error aborts.
pub fn screening_report(
    gateway: &dyn Gateway,
    collection_name: &str,
) -> Result<ScreeningReport, AuditError> {
    let collection_key = gateway
        .get_collection_id_by_name(collection_name)?
        .ok_or_else(|| AuditError::CollectionNotFound(collection_name.to_string()))?;

    let mut report = ScreeningReport {
        collection: collection_name.to_string(),
        ..Default::default()
    };

    for item in gateway.get_items_in_collection(&collection_key)? {
        if item.is_child() {
            continue;
        }
        report.total_items += 1;

        let children = match gateway.get_item_children(&item.key) {
            Ok(children) => children,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Could not read children of {}: {}", item.key, e);
                report.failed += 1;
                continue;
            }
        };

        let (entries, malformed) = read_entries(&children);
        if malformed {
            report.malformed_notes.push(item.key.clone());
        }
        let Some(latest) = latest_entry(&entries) else {
            continue;
        };

        report.screened_items += 1;
        match latest.decision().and_then(|d| d.parse::<Decision>().ok()) {
            Some(Decision::Accepted) => report.accepted_items += 1,
            Some(Decision::Rejected) => {
                report.rejected_items += 1;
                for code in latest.reason_codes() {
                    *report.rejections_by_code.entry(code).or_default() += 1;
                }
            }
            None => tracing::debug!("Audit note {} has no usable decision", latest.note_key),
        }
    }

    tracing::info!(
        "Report for '{}': {} items, {} screened ({} accepted, {} rejected), {} malformed",
        collection_name,
        report.total_items,
        report.screened_items,
        report.accepted_items,
        report.rejected_items,
        report.malformed_notes.len()
    );
    Ok(report)
}

/// Audit entries among the notes, and whether any note held broken JSON.
fn read_entries(children: &[ChildItem]) -> (Vec<AuditEntry>, bool) {
    let mut entries = Vec::new();
    let mut malformed = false;

    for child in children.iter().filter(|c| c.is_note()) {
        match extract_payload(child.note.as_deref().unwrap_or_default()) {
            Ok(payload) => entries.push(AuditEntry {
                note_key: child.key.clone(),
                note_version: child.version,
                payload,
            }),
            Err(CodecError::Malformed(e)) => {
                tracing::debug!("Malformed audit JSON in note {}: {}", child.key, e);
                malformed = true;
            }
            Err(_) => {}
        }
    }
    (entries, malformed)
}

/// Newest entry by timestamp; on a tie the later note wins.
fn latest_entry(entries: &[AuditEntry]) -> Option<&AuditEntry> {
    entries.iter().max_by(|a, b| a.timestamp().cmp(&b.timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_common::{attachment, item, note, FakeGateway, OfflineFake};

    fn fixture() -> FakeGateway {
        FakeGateway::new()
            .with_collection("COL", "Inbox")
            .with_item(item("INC", &["COL"], &[]))
            .with_child(
                "INC",
                note("N1", r#"<div>{"audit_version":"1.1","decision":"accepted","reason_code":["IC1"]}</div>"#),
            )
            .with_item(item("LEGACY", &["COL"], &[]))
            .with_child(
                "LEGACY",
                note("N2", r#"<div>{"audit_version":"1.0","decision":"rejected","code":"EC1"}</div>"#),
            )
            .with_item(item("SPLIT", &["COL"], &[]))
            .with_child(
                "SPLIT",
                note(
                    "N3",
                    r#"<p>{"action":"screening_decision","decision":"exclude","reason_code":"EC1, EC3"}</p>"#,
                ),
            )
            .with_item(item("BROKEN", &["COL"], &[]))
            .with_child("BROKEN", note("N4", r#"<div>{"audit_version":"1.1","decision":}</div>"#))
            .with_child("BROKEN", attachment("P1", "paper.pdf"))
            .with_item(item("OPEN", &["COL"], &[]))
            .with_child("OPEN", note("N5", "<p>Reading notes, no decision yet</p>"))
    }

    #[test]
    fn test_report_counts_outcomes_and_codes() {
        let report = screening_report(&fixture(), "Inbox").unwrap();

        assert_eq!(report.collection, "Inbox");
        assert_eq!(report.total_items, 5);
        assert_eq!(report.screened_items, 3);
        assert_eq!(report.accepted_items, 1);
        assert_eq!(report.rejected_items, 2);
        assert_eq!(report.rejections_by_code.get("EC1"), Some(&2));
        assert_eq!(report.rejections_by_code.get("EC3"), Some(&1));
        assert!(!report.rejections_by_code.contains_key("IC1"));
        assert_eq!(report.pending_items(), 2);
    }

    #[test]
    fn test_report_lists_malformed_notes() {
        let report = screening_report(&fixture(), "Inbox").unwrap();
        assert_eq!(report.malformed_notes, vec!["BROKEN"]);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_newest_note_decides() {
        let gateway = FakeGateway::new()
            .with_collection("COL", "Inbox")
            .with_item(item("A", &["COL"], &[]))
            .with_child(
                "A",
                note(
                    "NEW",
                    r#"<div>{"audit_version":"1.1","decision":"accepted","timestamp":"2025-03-01T00:00:00Z"}</div>"#,
                ),
            )
            .with_child(
                "A",
                note(
                    "OLD",
                    r#"<div>{"audit_version":"1.1","decision":"rejected","reason_code":["EC2"],"timestamp":"2025-01-01T00:00:00Z"}</div>"#,
                ),
            );

        let report = screening_report(&gateway, "Inbox").unwrap();
        assert_eq!(report.screened_items, 1);
        assert_eq!(report.accepted_items, 1);
        assert_eq!(report.rejected_items, 0);
        assert!(report.rejections_by_code.is_empty());
    }

    #[test]
    fn test_unreadable_item_is_counted() {
        let gateway = fixture();
        gateway.fail_children_for.borrow_mut().push("INC".to_string());

        let report = screening_report(&gateway, "Inbox").unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.accepted_items, 0);
        assert_eq!(report.total_items, 5);
    }

    #[test]
    fn test_unknown_collection() {
        match screening_report(&fixture(), "Nowhere") {
            Err(AuditError::CollectionNotFound(name)) => assert_eq!(name, "Nowhere"),
            other => panic!("Expected CollectionNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_report_reads_offline_backend() {
        let offline = OfflineFake(fixture());
        let report = screening_report(&offline, "Inbox").unwrap();
        assert_eq!(report.screened_items, 3);
    }
}
