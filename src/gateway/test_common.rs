//! Shared test infrastructure for services written against [`Gateway`].
//!
//! `FakeGateway` keeps items, children and collections in memory, bumps
//! versions on every accepted write and counts the calls the fast/slow
//! path and write ordering tests care about. Individual calls can be made
//! to fail or conflict.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::models::{ChildItem, Collection, LibraryItem, WriteOutcome, ATTACHMENT_TYPE, NOTE_TYPE};
use super::{Gateway, GatewayError, GatewayKind};

#[derive(Default)]
pub struct FakeGateway {
    pub items: RefCell<Vec<LibraryItem>>,
    pub children: RefCell<HashMap<String, Vec<ChildItem>>>,
    pub collections: RefCell<Vec<Collection>>,

    /// Calls to `get_item_children`, per parent key.
    pub child_lookups: RefCell<HashMap<String, usize>>,
    pub deleted: RefCell<Vec<String>>,

    pub fail_create_note: Cell<bool>,
    pub fail_tags: Cell<bool>,
    /// Parent keys whose child listing fails.
    pub fail_children_for: RefCell<Vec<String>>,
    /// The next collection update answers with a version conflict.
    pub conflict_next_move: Cell<bool>,
    /// Keys whose next write answers with a version conflict.
    pub conflict_on: RefCell<Vec<String>>,

    next_key: Cell<u32>,
}

pub fn item(key: &str, collections: &[&str], tags: &[&str]) -> LibraryItem {
    LibraryItem {
        key: key.to_string(),
        version: 1,
        item_type: "journalArticle".to_string(),
        collections: collections.iter().map(|c| c.to_string()).collect(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        title: Some(format!("Title of {key}")),
        abstract_note: None,
        doi: None,
        external_id: None,
        url: None,
        date: None,
        authors: Vec::new(),
        has_pdf: false,
    }
}

pub fn note(key: &str, body: &str) -> ChildItem {
    ChildItem {
        key: key.to_string(),
        version: 1,
        item_type: NOTE_TYPE.to_string(),
        note: Some(body.to_string()),
        content_type: None,
        link_mode: None,
        filename: None,
    }
}

pub fn attachment(key: &str, filename: &str) -> ChildItem {
    ChildItem {
        key: key.to_string(),
        version: 1,
        item_type: ATTACHMENT_TYPE.to_string(),
        note: None,
        content_type: Some("application/pdf".to_string()),
        link_mode: Some("imported_file".to_string()),
        filename: Some(filename.to_string()),
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, key: &str, name: &str) -> Self {
        self.collections.borrow_mut().push(Collection {
            key: key.to_string(),
            name: name.to_string(),
            parent_key: None,
        });
        self
    }

    pub fn with_item(self, item: LibraryItem) -> Self {
        self.items.borrow_mut().push(item);
        self
    }

    pub fn with_child(self, parent: &str, child: ChildItem) -> Self {
        self.children
            .borrow_mut()
            .entry(parent.to_string())
            .or_default()
            .push(child);
        self
    }

    pub fn item_snapshot(&self, key: &str) -> Option<LibraryItem> {
        self.items.borrow().iter().find(|i| i.key == key).cloned()
    }

    pub fn notes_of(&self, parent: &str) -> Vec<ChildItem> {
        self.children
            .borrow()
            .get(parent)
            .map(|c| c.iter().filter(|c| c.is_note()).cloned().collect())
            .unwrap_or_default()
    }

    pub fn lookups_for(&self, key: &str) -> usize {
        self.child_lookups.borrow().get(key).copied().unwrap_or(0)
    }

    fn take_conflict(&self, key: &str) -> bool {
        let mut conflicts = self.conflict_on.borrow_mut();
        match conflicts.iter().position(|k| k == key) {
            Some(pos) => {
                conflicts.remove(pos);
                true
            }
            None => false,
        }
    }

    fn update_item<F>(
        &self,
        key: &str,
        version: u64,
        apply: F,
    ) -> Result<WriteOutcome, GatewayError>
    where
        F: FnOnce(&mut LibraryItem),
    {
        let mut items = self.items.borrow_mut();
        let Some(item) = items.iter_mut().find(|i| i.key == key) else {
            return Err(GatewayError::WriteRejected(format!("no item {key}")));
        };
        if item.version != version || self.take_conflict(key) {
            return Ok(WriteOutcome::Conflict);
        }
        apply(item);
        item.version += 1;
        Ok(WriteOutcome::Applied)
    }
}

impl Gateway for FakeGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Remote
    }

    fn get_item(&self, key: &str) -> Result<Option<LibraryItem>, GatewayError> {
        Ok(self.item_snapshot(key))
    }

    fn get_item_children(&self, key: &str) -> Result<Vec<ChildItem>, GatewayError> {
        *self.child_lookups.borrow_mut().entry(key.to_string()).or_default() += 1;
        if self.fail_children_for.borrow().iter().any(|k| k == key) {
            return Err(GatewayError::WriteRejected(format!("children of {key} unavailable")));
        }
        Ok(self.children.borrow().get(key).cloned().unwrap_or_default())
    }

    fn get_items_in_collection(
        &self,
        collection_key: &str,
    ) -> Result<Vec<LibraryItem>, GatewayError> {
        Ok(self
            .items
            .borrow()
            .iter()
            .filter(|i| i.collections.iter().any(|c| c == collection_key))
            .cloned()
            .collect())
    }

    fn get_all_collections(&self) -> Result<Vec<Collection>, GatewayError> {
        Ok(self.collections.borrow().clone())
    }

    fn create_note(&self, parent_key: &str, body: &str) -> Result<String, GatewayError> {
        if self.fail_create_note.get() {
            return Err(GatewayError::WriteRejected("note rejected".to_string()));
        }
        let n = self.next_key.get() + 1;
        self.next_key.set(n);
        let key = format!("NOTE{n}");
        self.children
            .borrow_mut()
            .entry(parent_key.to_string())
            .or_default()
            .push(note(&key, body));
        Ok(key)
    }

    fn update_note(
        &self,
        key: &str,
        version: u64,
        body: &str,
    ) -> Result<WriteOutcome, GatewayError> {
        if self.take_conflict(key) {
            return Ok(WriteOutcome::Conflict);
        }
        let mut children = self.children.borrow_mut();
        for child in children.values_mut().flatten() {
            if child.key == key {
                if child.version != version {
                    return Ok(WriteOutcome::Conflict);
                }
                child.note = Some(body.to_string());
                child.version += 1;
                return Ok(WriteOutcome::Applied);
            }
        }
        Err(GatewayError::WriteRejected(format!("no note {key}")))
    }

    fn update_item_collections(
        &self,
        key: &str,
        version: u64,
        collection_keys: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        if self.conflict_next_move.replace(false) {
            return Ok(WriteOutcome::Conflict);
        }
        self.update_item(key, version, |item| item.collections = collection_keys.to_vec())
    }

    fn update_item_tags(
        &self,
        key: &str,
        version: u64,
        tags: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        if self.fail_tags.get() {
            return Err(GatewayError::WriteRejected("tags rejected".to_string()));
        }
        self.update_item(key, version, |item| item.tags = tags.to_vec())
    }

    fn delete_item(&self, key: &str, _version: u64) -> Result<WriteOutcome, GatewayError> {
        if self.take_conflict(key) {
            return Ok(WriteOutcome::Conflict);
        }
        for children in self.children.borrow_mut().values_mut() {
            children.retain(|c| c.key != key);
        }
        self.deleted.borrow_mut().push(key.to_string());
        Ok(WriteOutcome::Applied)
    }
}

/// Read-only twin of [`FakeGateway`], for veto tests.
pub struct OfflineFake(pub FakeGateway);

impl Gateway for OfflineFake {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Mirror
    }

    fn get_item(&self, key: &str) -> Result<Option<LibraryItem>, GatewayError> {
        self.0.get_item(key)
    }

    fn get_item_children(&self, key: &str) -> Result<Vec<ChildItem>, GatewayError> {
        self.0.get_item_children(key)
    }

    fn get_items_in_collection(
        &self,
        collection_key: &str,
    ) -> Result<Vec<LibraryItem>, GatewayError> {
        self.0.get_items_in_collection(collection_key)
    }

    fn get_all_collections(&self) -> Result<Vec<Collection>, GatewayError> {
        self.0.get_all_collections()
    }

    fn create_note(&self, _parent_key: &str, _body: &str) -> Result<String, GatewayError> {
        Err(GatewayError::ReadOnly { operation: "create_note" })
    }

    fn update_note(
        &self,
        _key: &str,
        _version: u64,
        _body: &str,
    ) -> Result<WriteOutcome, GatewayError> {
        Err(GatewayError::ReadOnly { operation: "update_note" })
    }

    fn update_item_collections(
        &self,
        _key: &str,
        _version: u64,
        _keys: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        Err(GatewayError::ReadOnly {
            operation: "update_item_collections",
        })
    }

    fn update_item_tags(
        &self,
        _key: &str,
        _version: u64,
        _tags: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        Err(GatewayError::ReadOnly { operation: "update_item_tags" })
    }

    fn delete_item(&self, _key: &str, _version: u64) -> Result<WriteOutcome, GatewayError> {
        Err(GatewayError::ReadOnly { operation: "delete_item" })
    }
}
