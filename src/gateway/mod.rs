//! Backends for reading and writing the reference library.
//!
//! A session talks to exactly one backend, chosen at configuration time:
//!
//! - `remote` - read/write access through the REST API
//! - `mirror` - read-only access to a local snapshot of the library
//!
//! Both implement [`Gateway`], the capability surface the screening and
//! audit services are written against.

pub mod mirror;
pub mod models;
pub mod remote;

#[cfg(test)]
pub(crate) mod test_common;

pub use mirror::MirrorGateway;
pub use models::{ChildItem, Collection, LibraryItem, WriteOutcome};
pub use remote::RemoteGateway;

use std::fmt;

use crate::config::Backend;
use crate::transport::{LibraryClient, TransportError};

/// Identity of a concrete gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// Online store, read/write.
    Remote,
    /// Offline snapshot, read-only.
    Mirror,
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayKind::Remote => write!(f, "remote"),
            GatewayKind::Mirror => write!(f, "mirror"),
        }
    }
}

/// Errors surfaced by a gateway.
///
/// Not-found and version conflicts are not errors here: reads return
/// `Option`, conditioned writes return [`WriteOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A write was attempted on the read-only mirror.
    #[error("Offline mirror is read-only: {operation} is not permitted")]
    ReadOnly { operation: &'static str },

    /// The gateway cannot operate in the current configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote store could not be reached or answered with an error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The store accepted the request but reported the write as failed.
    #[error("Write rejected by store: {0}")]
    WriteRejected(String),

    /// Query against the mirror snapshot failed.
    #[error("Mirror query failed: {0}")]
    Mirror(#[from] rusqlite::Error),

    /// Filesystem error while preparing the mirror snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Whether the error is a configuration or read-only veto, which must
    /// abort the calling operation rather than be counted and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::ReadOnly { .. } | GatewayError::Configuration(_)
        )
    }
}

/// Capability surface shared by both backends.
pub trait Gateway {
    /// Which backend this is.
    fn kind(&self) -> GatewayKind;

    /// Fetches an item, or `None` if the store has no such key.
    fn get_item(&self, key: &str) -> Result<Option<LibraryItem>, GatewayError>;

    /// Lists child notes and attachments of an item.
    fn get_item_children(&self, key: &str) -> Result<Vec<ChildItem>, GatewayError>;

    /// Lists every item in a collection.
    fn get_items_in_collection(&self, collection_key: &str)
        -> Result<Vec<LibraryItem>, GatewayError>;

    /// Lists every collection in the library.
    fn get_all_collections(&self) -> Result<Vec<Collection>, GatewayError>;

    /// Resolves a collection name to its key.
    fn get_collection_id_by_name(&self, name: &str) -> Result<Option<String>, GatewayError> {
        Ok(self
            .get_all_collections()?
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.key))
    }

    /// Creates a child note and returns the new note's key.
    fn create_note(&self, parent_key: &str, body: &str) -> Result<String, GatewayError>;

    /// Replaces the body of an existing note.
    fn update_note(&self, key: &str, version: u64, body: &str)
        -> Result<WriteOutcome, GatewayError>;

    /// Replaces an item's collection set in one version-checked write.
    fn update_item_collections(
        &self,
        key: &str,
        version: u64,
        collection_keys: &[String],
    ) -> Result<WriteOutcome, GatewayError>;

    /// Replaces an item's tag set in one version-checked write.
    fn update_item_tags(
        &self,
        key: &str,
        version: u64,
        tags: &[String],
    ) -> Result<WriteOutcome, GatewayError>;

    /// Adds tags to an item, keeping existing ones.
    ///
    /// Re-fetches the item so the write is checked against its current
    /// version. Returns `None` if the item does not exist.
    fn add_tags(&self, key: &str, tags: &[String]) -> Result<Option<WriteOutcome>, GatewayError> {
        let Some(item) = self.get_item(key)? else {
            return Ok(None);
        };
        let mut merged = item.tags.clone();
        for tag in tags {
            if !merged.contains(tag) {
                merged.push(tag.clone());
            }
        }
        if merged.len() == item.tags.len() {
            return Ok(Some(WriteOutcome::Applied));
        }
        self.update_item_tags(key, item.version, &merged).map(Some)
    }

    /// Deletes an item (including child notes and attachments).
    fn delete_item(&self, key: &str, version: u64) -> Result<WriteOutcome, GatewayError>;
}

/// Refuses to continue on a read-only backend.
///
/// Destructive batch services call this before any other work, so the veto
/// holds even when the caller only asked for a dry run.
pub fn ensure_writable(gateway: &dyn Gateway, operation: &'static str) -> Result<(), GatewayError> {
    match gateway.kind() {
        GatewayKind::Remote => Ok(()),
        GatewayKind::Mirror => Err(GatewayError::ReadOnly { operation }),
    }
}

/// Opens the gateway for the configured backend.
pub fn open_gateway(backend: &Backend) -> Result<Box<dyn Gateway>, GatewayError> {
    match backend {
        Backend::Remote {
            api_key,
            library_id,
            library_type,
            api_url,
            timeout,
        } => {
            let mut client = LibraryClient::new(api_key, library_id, *library_type)?;
            if let Some(url) = api_url {
                client = client.with_base_url(url);
            }
            if let Some(timeout) = timeout {
                client = client.with_timeout(*timeout)?;
            }
            tracing::debug!("Using remote library at {}", client.library_url());
            Ok(Box::new(RemoteGateway::new(client)))
        }
        Backend::Mirror { path } => {
            tracing::debug!("Using offline mirror at {}", path.display());
            Ok(Box::new(MirrorGateway::open(path)?))
        }
    }
}
