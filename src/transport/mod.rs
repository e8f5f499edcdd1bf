//! Transport layer for the remote library API.
//!
//! Provides authenticated HTTP access to the versioned library store,
//! including pagination, bounded retry of transient faults, and the
//! optimistic-concurrency version protocol.
//!
//! # Submodules
//!
//! - `client` - HTTP client that owns the session's library version baseline
//! - `retry` - Backoff policy for transient network faults

pub mod client;
pub mod retry;

pub use client::{ApiResponse, LibraryClient, LibraryType};
pub use retry::RetryPolicy;

/// Default base URL of the library API.
pub const DEFAULT_API_URL: &str = "https://api.zotero.org";

/// API protocol version sent with every request.
pub const API_VERSION: &str = "3";

/// Header carrying the API protocol version.
pub const API_VERSION_HEADER: &str = "Zotero-API-Version";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "Zotero-API-Key";

/// Header returned by the server with the current library version.
pub const LAST_MODIFIED_VERSION_HEADER: &str = "Last-Modified-Version";

/// Precondition header attached to version-checked writes.
pub const IF_UNMODIFIED_SINCE_VERSION_HEADER: &str = "If-Unmodified-Since-Version";

/// Status the server answers with when a version precondition fails.
pub const PRECONDITION_FAILED: u16 = 412;

/// Errors raised by the transport.
///
/// Version conflicts are deliberately absent: a 412 answer is returned to
/// the caller as an [`ApiResponse`], not raised.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A transient fault persisted through every retry attempt.
    #[error("Request to {url} failed after {attempts} attempts: {source}")]
    Transient {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Non-transient HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status other than a version conflict.
    #[error("Server error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The response body could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Returns the HTTP status if the error came from a server answer.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
