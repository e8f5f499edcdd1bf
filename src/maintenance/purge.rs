//! Bulk removal of notes, tags and attachments.

use serde::Serialize;

use crate::audit::parse_note;
use crate::gateway::{ensure_writable, ChildItem, Gateway, GatewayError, WriteOutcome};

/// Counters reported by every purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    /// Objects removed.
    pub deleted: usize,
    /// Objects that matched but were left alone because of a dry run.
    pub skipped: usize,
    /// Items that could not be read and writes that failed or conflicted.
    pub errors: usize,
}

/// Destructive batch operations over one backend.
///
/// Every entry point refuses a read-only backend before touching it, even
/// for a dry run.
pub struct PurgeService<'a> {
    gateway: &'a dyn Gateway,
}

impl<'a> PurgeService<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self { gateway }
    }

    /// Keys of the top-level items in a named collection, or `None` if
    /// there is no such collection.
    pub fn collection_keys(
        &self,
        collection_name: &str,
    ) -> Result<Option<Vec<String>>, GatewayError> {
        ensure_writable(self.gateway, "purge")?;

        let Some(collection_key) = self.gateway.get_collection_id_by_name(collection_name)? else {
            return Ok(None);
        };
        let keys = self
            .gateway
            .get_items_in_collection(&collection_key)?
            .into_iter()
            .filter(|item| !item.is_child())
            .map(|item| item.key)
            .collect();
        Ok(Some(keys))
    }

    /// Deletes child notes of the given items.
    ///
    /// With `audit_only`, only notes carrying an audit record are removed;
    /// `phase` further restricts them to records of that review phase.
    pub fn purge_notes(
        &self,
        item_keys: &[String],
        audit_only: bool,
        phase: Option<&str>,
        dry_run: bool,
    ) -> Result<PurgeStats, GatewayError> {
        ensure_writable(self.gateway, "purge notes")?;

        self.purge_children(item_keys, dry_run, |child| {
            if !child.is_note() {
                return false;
            }
            if !audit_only && phase.is_none() {
                return true;
            }
            let Some(payload) = parse_note(child.note.as_deref().unwrap_or_default()) else {
                return false;
            };
            match phase {
                Some(phase) => payload.get("phase").and_then(|p| p.as_str()) == Some(phase),
                None => true,
            }
        })
    }

    /// Deletes child attachments of the given items.
    pub fn purge_attachments(
        &self,
        item_keys: &[String],
        dry_run: bool,
    ) -> Result<PurgeStats, GatewayError> {
        ensure_writable(self.gateway, "purge attachments")?;
        self.purge_children(item_keys, dry_run, ChildItem::is_attachment)
    }

    /// Removes one tag, or every tag when `tag` is `None`, from the given items.
    pub fn purge_tags(
        &self,
        item_keys: &[String],
        tag: Option<&str>,
        dry_run: bool,
    ) -> Result<PurgeStats, GatewayError> {
        ensure_writable(self.gateway, "purge tags")?;

        let mut stats = PurgeStats::default();
        for key in item_keys {
            let item = match self.gateway.get_item(key) {
                Ok(Some(item)) => item,
                Ok(None) => {
                    tracing::warn!("Item {} not found", key);
                    stats.errors += 1;
                    continue;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Could not read {}: {}", key, e);
                    stats.errors += 1;
                    continue;
                }
            };

            let remaining: Vec<String> = match tag {
                Some(tag) if !item.has_tag(tag) => continue,
                Some(tag) => item.tags.iter().filter(|t| *t != tag).cloned().collect(),
                None if item.tags.is_empty() => continue,
                None => Vec::new(),
            };

            if dry_run {
                stats.skipped += 1;
                continue;
            }
            self.count_write(
                &mut stats,
                key,
                self.gateway.update_item_tags(key, item.version, &remaining),
            )?;
        }
        Ok(stats)
    }

    fn purge_children<F>(
        &self,
        item_keys: &[String],
        dry_run: bool,
        matches: F,
    ) -> Result<PurgeStats, GatewayError>
    where
        F: Fn(&ChildItem) -> bool,
    {
        let mut stats = PurgeStats::default();
        for parent in item_keys {
            let children = match self.gateway.get_item_children(parent) {
                Ok(children) => children,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Could not read children of {}: {}", parent, e);
                    stats.errors += 1;
                    continue;
                }
            };

            for child in children.iter().filter(|c| matches(*c)) {
                if dry_run {
                    tracing::debug!("Would delete {} from {}", child.key, parent);
                    stats.skipped += 1;
                    continue;
                }
                self.count_write(
                    &mut stats,
                    &child.key,
                    self.gateway.delete_item(&child.key, child.version),
                )?;
            }
        }
        Ok(stats)
    }

    fn count_write(
        &self,
        stats: &mut PurgeStats,
        key: &str,
        result: Result<WriteOutcome, GatewayError>,
    ) -> Result<(), GatewayError> {
        match result {
            Ok(WriteOutcome::Applied) => stats.deleted += 1,
            Ok(WriteOutcome::Conflict) => {
                tracing::warn!("{} changed concurrently, not purged", key);
                stats.errors += 1;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to purge {}: {}", key, e);
                stats.errors += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_common::{attachment, item, note, FakeGateway, OfflineFake};

    const TA_NOTE: &str = r#"<div>{"audit_version":"1.1","decision":"accepted","phase":"title_abstract"}</div>"#;
    const FT_NOTE: &str = r#"<div>{"action":"screening_decision","decision":"rejected","phase":"full_text"}</div>"#;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn fixture() -> FakeGateway {
        FakeGateway::new()
            .with_item(item("A", &[], &["phase:title_abstract", "accepted:IC1"]))
            .with_item(item("B", &[], &[]))
            .with_child("A", note("N1", TA_NOTE))
            .with_child("A", note("N2", FT_NOTE))
            .with_child("A", note("N3", "<p>reading notes</p>"))
            .with_child("A", attachment("F1", "a.pdf"))
    }

    #[test]
    fn test_purge_all_notes() {
        let gateway = fixture();
        let stats = PurgeService::new(&gateway)
            .purge_notes(&keys(&["A", "B"]), false, None, false)
            .unwrap();
        assert_eq!(stats.deleted, 3);
        assert_eq!(*gateway.deleted.borrow(), vec!["N1", "N2", "N3"]);
    }

    #[test]
    fn test_purge_audit_notes_by_phase() {
        let gateway = fixture();
        let service = PurgeService::new(&gateway);

        let stats = service.purge_notes(&keys(&["A"]), true, Some("full_text"), false).unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(*gateway.deleted.borrow(), vec!["N2"]);

        let stats = service.purge_notes(&keys(&["A"]), true, None, false).unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(gateway.notes_of("A").len(), 1);
    }

    #[test]
    fn test_dry_run_counts_without_deleting() {
        let gateway = fixture();
        let stats = PurgeService::new(&gateway)
            .purge_attachments(&keys(&["A"]), true)
            .unwrap();
        assert_eq!(stats, PurgeStats { deleted: 0, skipped: 1, errors: 0 });
        assert!(gateway.deleted.borrow().is_empty());
    }

    #[test]
    fn test_purge_tags() {
        let gateway = fixture();
        let service = PurgeService::new(&gateway);

        let stats = service
            .purge_tags(&keys(&["A", "B", "MISSING"]), Some("accepted:IC1"), false)
            .unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(gateway.item_snapshot("A").unwrap().tags, vec!["phase:title_abstract"]);

        let stats = service.purge_tags(&keys(&["A"]), None, false).unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(gateway.item_snapshot("A").unwrap().tags.is_empty());
    }

    #[test]
    fn test_conflicts_and_read_failures_are_errors() {
        let gateway = fixture();
        gateway.conflict_on.borrow_mut().push("N1".to_string());
        gateway.fail_children_for.borrow_mut().push("B".to_string());

        let stats = PurgeService::new(&gateway)
            .purge_notes(&keys(&["A", "B"]), true, None, false)
            .unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn test_offline_veto_ignores_dry_run() {
        let gateway = OfflineFake(fixture());
        let service = PurgeService::new(&gateway);
        let targets = keys(&["A"]);

        for result in [
            service.purge_notes(&targets, false, None, true),
            service.purge_attachments(&targets, true),
            service.purge_tags(&targets, None, true),
        ] {
            assert!(matches!(result, Err(GatewayError::ReadOnly { .. })));
        }
        assert_eq!(gateway.0.lookups_for("A"), 0);
    }

    #[test]
    fn test_collection_keys() {
        let gateway = fixture().with_collection("COL", "Inbox");
        gateway.items.borrow_mut()[1].collections.push("COL".to_string());
        let service = PurgeService::new(&gateway);

        assert_eq!(service.collection_keys("Inbox").unwrap(), Some(vec!["B".to_string()]));
        assert_eq!(service.collection_keys("Nope").unwrap(), None);

        let offline = OfflineFake(fixture().with_collection("COL", "Inbox"));
        assert!(PurgeService::new(&offline).collection_keys("Inbox").is_err());
    }
}
