//! Metadata completeness check for the items of a collection.

use serde::Serialize;

use crate::gateway::{Gateway, GatewayError, LibraryItem};

/// Keys of the items missing each piece of metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub collection: String,
    pub total_items: usize,
    /// No DOI and no external identifier.
    pub missing_identifier: Vec<String>,
    pub missing_title: Vec<String>,
    pub missing_abstract: Vec<String>,
    /// No stored PDF attachment.
    pub missing_pdf: Vec<String>,
    /// Items whose attachments could not be listed.
    pub failed: Vec<String>,
}

impl QualityReport {
    /// Whether every item passed every check.
    pub fn is_complete(&self) -> bool {
        self.missing_identifier.is_empty()
            && self.missing_title.is_empty()
            && self.missing_abstract.is_empty()
            && self.missing_pdf.is_empty()
            && self.failed.is_empty()
    }
}

/// Checks every top-level item of a named collection.
///
/// Returns `None` for an unknown collection. Read-only, so it runs on
/// either backend.
pub fn check_collection(
    gateway: &dyn Gateway,
    collection_name: &str,
) -> Result<Option<QualityReport>, GatewayError> {
    let Some(collection_key) = gateway.get_collection_id_by_name(collection_name)? else {
        return Ok(None);
    };

    let mut report = QualityReport {
        collection: collection_name.to_string(),
        ..Default::default()
    };

    for item in gateway.get_items_in_collection(&collection_key)? {
        if item.is_child() {
            continue;
        }
        report.total_items += 1;

        if !item.has_identifier() {
            report.missing_identifier.push(item.key.clone());
        }
        if item.title.is_none() {
            report.missing_title.push(item.key.clone());
        }
        if item.abstract_note.is_none() {
            report.missing_abstract.push(item.key.clone());
        }

        match has_pdf(gateway, &item) {
            Ok(true) => {}
            Ok(false) => report.missing_pdf.push(item.key.clone()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Could not check attachments of {}: {}", item.key, e);
                report.failed.push(item.key.clone());
            }
        }
    }

    tracing::info!(
        "Checked {} items in '{}': {} without identifier, {} without abstract, {} without PDF",
        report.total_items,
        collection_name,
        report.missing_identifier.len(),
        report.missing_abstract.len(),
        report.missing_pdf.len()
    );
    Ok(Some(report))
}

/// The mirror already knows about PDFs; otherwise the children are listed.
fn has_pdf(gateway: &dyn Gateway, item: &LibraryItem) -> Result<bool, GatewayError> {
    if item.has_pdf {
        return Ok(true);
    }
    Ok(gateway
        .get_item_children(&item.key)?
        .iter()
        .any(|child| child.is_pdf()))
}
