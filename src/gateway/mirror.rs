//! Read-only gateway over a local snapshot of the library.
//!
//! The snapshot belongs to the desktop client, which may be writing to it
//! at any moment. The gateway never opens that file: it copies it to a
//! private temporary shadow and runs every query against the copy, opened
//! with `SQLITE_OPEN_READ_ONLY`.
//!
//! Write-class operations always fail with [`GatewayError::ReadOnly`].

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::models::{ChildItem, Collection, LibraryItem, WriteOutcome, ATTACHMENT_TYPE, NOTE_TYPE};
use super::{Gateway, GatewayError, GatewayKind};

/// Item columns shared by every item query.
const ITEM_COLUMNS: &str = "i.itemID, i.key, i.version, it.typeName";

/// Excludes items in the trash.
const NOT_DELETED: &str = "i.itemID NOT IN (SELECT itemID FROM deletedItems)";

/// Gateway over a shadow copy of the desktop client's database.
pub struct MirrorGateway {
    /// Connection to the shadow copy. Declared before `shadow` so it is
    /// closed before the file is removed.
    conn: Connection,
    /// Temporary copy, deleted on drop.
    shadow: NamedTempFile,
    /// The snapshot the shadow was taken from.
    source: PathBuf,
}

/// Columns of an item row before hydration.
struct ItemRow {
    id: i64,
    key: String,
    version: u64,
    item_type: String,
}

impl MirrorGateway {
    /// Takes a shadow copy of the snapshot at `path` and opens it.
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        if !path.is_file() {
            return Err(GatewayError::Configuration(format!(
                "Library snapshot not found at {}",
                path.display()
            )));
        }

        let shadow = tempfile::Builder::new()
            .prefix("litaudit-shadow-")
            .suffix(".sqlite")
            .tempfile()?;
        std::fs::copy(path, shadow.path())?;
        tracing::debug!(
            "Shadow copy of {} taken at {}",
            path.display(),
            shadow.path().display()
        );

        let conn = Connection::open_with_flags(
            shadow.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn,
            shadow,
            source: path.to_path_buf(),
        })
    }

    /// The snapshot this gateway reads from.
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Location of the private shadow copy.
    pub fn shadow_path(&self) -> &Path {
        self.shadow.path()
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<ItemRow> {
        Ok(ItemRow {
            id: row.get(0)?,
            key: row.get(1)?,
            version: row.get::<_, i64>(2)?.max(0) as u64,
            item_type: row.get(3)?,
        })
    }

    /// Joins fields, creators, collections, tags and attachments onto a row.
    fn hydrate(&self, row: ItemRow) -> Result<LibraryItem, GatewayError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT f.fieldName, v.value
             FROM itemData d
             JOIN fields f ON d.fieldID = f.fieldID
             JOIN itemDataValues v ON d.valueID = v.valueID
             WHERE d.itemID = ?1",
        )?;
        let fields = stmt
            .query_map(params![row.id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let field = |name: &str| {
            fields
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, v)| v.clone())
                .filter(|v| !v.trim().is_empty())
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT c.firstName, c.lastName, ct.creatorType
             FROM itemCreators ic
             JOIN creators c ON ic.creatorID = c.creatorID
             JOIN creatorTypes ct ON ic.creatorTypeID = ct.creatorTypeID
             WHERE ic.itemID = ?1
             ORDER BY ic.orderIndex",
        )?;
        let authors = stmt
            .query_map(params![row.id], |r| {
                Ok((
                    r.get::<_, Option<String>>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|(_, _, kind)| kind == "author")
            .map(|(first, last, _)| {
                format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
                    .trim()
                    .to_string()
            })
            .filter(|name| !name.is_empty())
            .collect();

        let mut stmt = self.conn.prepare_cached(
            "SELECT c.key
             FROM collectionItems ci
             JOIN collections c ON ci.collectionID = c.collectionID
             WHERE ci.itemID = ?1
             ORDER BY c.collectionID",
        )?;
        let collections = stmt
            .query_map(params![row.id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut stmt = self.conn.prepare_cached(
            "SELECT t.name
             FROM itemTags it
             JOIN tags t ON it.tagID = t.tagID
             WHERE it.itemID = ?1
             ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![row.id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let pdf_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM itemAttachments a
             JOIN items i ON a.itemID = i.itemID
             WHERE a.parentItemID = ?1 AND a.contentType = 'application/pdf'
               AND i.itemID NOT IN (SELECT itemID FROM deletedItems)",
            params![row.id],
            |r| r.get(0),
        )?;

        let extra = field("extra");
        let url = field("url");
        Ok(LibraryItem {
            external_id: super::models::extract_external_id(extra.as_deref(), url.as_deref()),
            key: row.key,
            version: row.version,
            item_type: row.item_type,
            collections,
            tags,
            title: field("title"),
            abstract_note: field("abstractNote"),
            doi: field("DOI"),
            url,
            date: field("date"),
            authors,
            has_pdf: pdf_count > 0,
        })
    }

    fn read_only(operation: &'static str) -> GatewayError {
        tracing::warn!("Refusing {} on the offline mirror", operation);
        GatewayError::ReadOnly { operation }
    }
}

/// Maps the desktop client's numeric link modes to their API names.
fn link_mode_name(mode: Option<i64>) -> Option<String> {
    let name = match mode? {
        0 => "imported_file",
        1 => "imported_url",
        2 => "linked_file",
        3 => "linked_url",
        4 => "embedded_image",
        _ => return None,
    };
    Some(name.to_string())
}

impl Gateway for MirrorGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Mirror
    }

    fn get_item(&self, key: &str) -> Result<Option<LibraryItem>, GatewayError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}
             FROM items i
             JOIN itemTypes it ON i.itemTypeID = it.itemTypeID
             WHERE i.key = ?1 AND {NOT_DELETED}"
        );
        let row = self
            .conn
            .query_row(&sql, params![key], Self::row_to_item)
            .optional()?;
        row.map(|r| self.hydrate(r)).transpose()
    }

    fn get_item_children(&self, key: &str) -> Result<Vec<ChildItem>, GatewayError> {
        let mut children = Vec::new();

        let sql = format!(
            "SELECT i.key, i.version, n.note
             FROM itemNotes n
             JOIN items i ON n.itemID = i.itemID
             WHERE n.parentItemID = (SELECT itemID FROM items WHERE key = ?1) AND {NOT_DELETED}
             ORDER BY i.itemID"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let notes = stmt.query_map(params![key], |row| {
            Ok(ChildItem {
                key: row.get(0)?,
                version: row.get::<_, i64>(1)?.max(0) as u64,
                item_type: NOTE_TYPE.to_string(),
                note: row.get(2)?,
                content_type: None,
                link_mode: None,
                filename: None,
            })
        })?;
        for note in notes {
            children.push(note?);
        }

        let sql = format!(
            "SELECT i.key, i.version, a.contentType, a.linkMode, a.path
             FROM itemAttachments a
             JOIN items i ON a.itemID = i.itemID
             WHERE a.parentItemID = (SELECT itemID FROM items WHERE key = ?1) AND {NOT_DELETED}
             ORDER BY i.itemID"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let attachments = stmt.query_map(params![key], |row| {
            let path: Option<String> = row.get(4)?;
            Ok(ChildItem {
                key: row.get(0)?,
                version: row.get::<_, i64>(1)?.max(0) as u64,
                item_type: ATTACHMENT_TYPE.to_string(),
                note: None,
                content_type: row.get(2)?,
                link_mode: link_mode_name(row.get(3)?),
                filename: path.map(|p| p.trim_start_matches("storage:").to_string()),
            })
        })?;
        for attachment in attachments {
            children.push(attachment?);
        }

        Ok(children)
    }

    fn get_items_in_collection(
        &self,
        collection_key: &str,
    ) -> Result<Vec<LibraryItem>, GatewayError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}
             FROM collectionItems ci
             JOIN collections c ON ci.collectionID = c.collectionID
             JOIN items i ON ci.itemID = i.itemID
             JOIN itemTypes it ON i.itemTypeID = it.itemTypeID
             WHERE c.key = ?1 AND {NOT_DELETED}
             ORDER BY ci.orderIndex, i.itemID"
        );
        let rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params![collection_key], Self::row_to_item)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter().map(|r| self.hydrate(r)).collect()
    }

    fn get_all_collections(&self) -> Result<Vec<Collection>, GatewayError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.key, c.collectionName, p.key
             FROM collections c
             LEFT JOIN collections p ON c.parentCollectionID = p.collectionID
             ORDER BY c.collectionName",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Collection {
                key: row.get(0)?,
                name: row.get(1)?,
                parent_key: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_note(&self, _parent_key: &str, _body: &str) -> Result<String, GatewayError> {
        Err(Self::read_only("create_note"))
    }

    fn update_note(
        &self,
        _key: &str,
        _version: u64,
        _body: &str,
    ) -> Result<WriteOutcome, GatewayError> {
        Err(Self::read_only("update_note"))
    }

    fn update_item_collections(
        &self,
        _key: &str,
        _version: u64,
        _collection_keys: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        Err(Self::read_only("update_item_collections"))
    }

    fn update_item_tags(
        &self,
        _key: &str,
        _version: u64,
        _tags: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        Err(Self::read_only("update_item_tags"))
    }

    fn add_tags(&self, _key: &str, _tags: &[String]) -> Result<Option<WriteOutcome>, GatewayError> {
        Err(Self::read_only("add_tags"))
    }

    fn delete_item(&self, _key: &str, _version: u64) -> Result<WriteOutcome, GatewayError> {
        Err(Self::read_only("delete_item"))
    }
}
