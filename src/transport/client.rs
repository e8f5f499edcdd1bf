//! HTTP client for the remote library API.
//!
//! Provides the `LibraryClient`, which authenticates every call, walks
//! paginated listings, retries transient faults, and tracks the session's
//! last observed library version for conditional writes.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::retry::{is_transient, RetryPolicy};
use super::{
    TransportError, API_KEY_HEADER, API_VERSION, API_VERSION_HEADER, DEFAULT_API_URL,
    IF_UNMODIFIED_SINCE_VERSION_HEADER, LAST_MODIFIED_VERSION_HEADER, PRECONDITION_FAILED,
};

/// Timeout for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the entire request including response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used when walking listings.
pub const PAGE_LIMIT: usize = 100;

/// Kind of library addressed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryType {
    /// A personal library (`/users/<id>`).
    User,
    /// A shared group library (`/groups/<id>`).
    #[default]
    Group,
}

impl LibraryType {
    fn path_segment(self) -> &'static str {
        match self {
            LibraryType::User => "users",
            LibraryType::Group => "groups",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryType::User => write!(f, "user"),
            LibraryType::Group => write!(f, "group"),
        }
    }
}

impl FromStr for LibraryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(LibraryType::User),
            "group" => Ok(LibraryType::Group),
            other => Err(format!(
                "Unknown library type: '{other}'. Expected one of: user, group"
            )),
        }
    }
}

/// A response the transport chose to hand back to the caller.
///
/// Successful answers and version conflicts (412) both arrive here; the
/// caller decides what a conflict means for its operation.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of `Last-Modified-Version`, if the server sent one.
    pub version: Option<u64>,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Whether the server rejected a version-checked write.
    pub fn is_conflict(&self) -> bool {
        self.status == PRECONDITION_FAILED
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

/// Authenticated client for one library.
///
/// The client owns the session's library version baseline. It is updated
/// from every `Last-Modified-Version` header and sent back as
/// `If-Unmodified-Since-Version` on version-checked writes. The baseline
/// lives in a `Cell`, so a client cannot be shared across threads.
pub struct LibraryClient {
    /// HTTP client instance.
    client: Client,
    /// Base URL of the API, without trailing slash.
    base_url: String,
    /// Library prefix, e.g. `groups/12345`.
    prefix: String,
    /// API key for authentication.
    api_key: String,
    /// Backoff policy for transient faults.
    retry: RetryPolicy,
    /// Last library version observed in a response.
    last_version: Cell<u64>,
}

impl LibraryClient {
    /// Creates a client for the given library with default timeouts.
    pub fn new(
        api_key: &str,
        library_id: &str,
        library_type: LibraryType,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_API_URL.to_string(),
            prefix: format!("{}/{}", library_type.path_segment(), library_id),
            api_key: api_key.to_string(),
            retry: RetryPolicy::default(),
            last_version: Cell::new(0),
        })
    }

    /// Points the client at a different API host.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TransportError> {
        self.client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(self)
    }

    /// Full URL of the library root.
    pub fn library_url(&self) -> String {
        format!("{}/{}", self.base_url, self.prefix)
    }

    /// Last library version observed in a response.
    pub fn last_version(&self) -> u64 {
        self.last_version.get()
    }

    /// Reads a resource. Any non-success status is an error.
    pub fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(path);
        self.execute(&url, false, || self.request(Method::GET, &url).query(query))
    }

    /// Reads every page of a listing and returns the concatenated entries.
    pub fn get_paginated(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, TransportError> {
        let mut entries = Vec::new();
        let mut start = 0usize;

        loop {
            let mut page_query: Vec<(&str, String)> = query.to_vec();
            page_query.push(("limit", PAGE_LIMIT.to_string()));
            page_query.push(("start", start.to_string()));

            let page: Vec<Value> = self.get(path, &page_query)?.json()?;
            let count = page.len();
            entries.extend(page);

            if count < PAGE_LIMIT {
                break;
            }
            start += count;
        }

        tracing::debug!("Fetched {} entries from {}", entries.len(), path);
        Ok(entries)
    }

    /// Creates resources.
    pub fn post(&self, path: &str, payload: &Value) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(path);
        self.execute(&url, false, || self.request(Method::POST, &url).json(payload))
    }

    /// Partially updates a resource.
    ///
    /// With `version_check`, the last observed version is sent as a
    /// precondition and a conflict comes back as a 412 response.
    pub fn patch(
        &self,
        path: &str,
        payload: &Value,
        version_check: bool,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(path);
        self.execute(&url, true, || {
            self.conditional(self.request(Method::PATCH, &url).json(payload), version_check)
        })
    }

    /// Deletes a resource, with the same precondition handling as `patch`.
    pub fn delete(
        &self,
        path: &str,
        query: &[(&str, String)],
        version_check: bool,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(path);
        self.execute(&url, true, || {
            self.conditional(self.request(Method::DELETE, &url).query(query), version_check)
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.library_url(), path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_VERSION_HEADER, API_VERSION)
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn conditional(&self, builder: RequestBuilder, version_check: bool) -> RequestBuilder {
        if version_check {
            builder.header(
                IF_UNMODIFIED_SINCE_VERSION_HEADER,
                self.last_version.get().to_string(),
            )
        } else {
            builder
        }
    }

    /// Sends a request and reads its body, retrying transient faults per
    /// the policy.
    ///
    /// The body is read inside the retried section, so a connection that
    /// drops mid-body is retried like one that never connected.
    fn execute<F>(
        &self,
        url: &str,
        allow_conflict: bool,
        build: F,
    ) -> Result<ApiResponse, TransportError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            match build().send().and_then(read_response) {
                Ok(response) => return self.finish(response, allow_conflict),
                Err(e) if is_transient(&e) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(TransportError::Transient {
                            url: url.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Transient failure on {} (attempt {}/{}), retrying in {:?}: {}",
                        url,
                        attempt,
                        self.retry.max_attempts,
                        delay,
                        e
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(TransportError::Http(e)),
            }
        }
    }

    /// Records the version header and converts the status.
    fn finish(
        &self,
        response: ApiResponse,
        allow_conflict: bool,
    ) -> Result<ApiResponse, TransportError> {
        let is_conflict = allow_conflict && response.is_conflict();
        if !response.is_success() && !is_conflict {
            let message = if response.body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                response.body
            };
            return Err(TransportError::Status {
                status: response.status,
                message,
            });
        }

        if let Some(version) = response.version {
            self.last_version.set(version);
        }
        if is_conflict {
            tracing::debug!("Version precondition failed (412)");
        }
        Ok(response)
    }
}

/// Reads status, version header and the full body of a response.
fn read_response(response: Response) -> reqwest::Result<ApiResponse> {
    let status = response.status().as_u16();
    let version = response
        .headers()
        .get(LAST_MODIFIED_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text()?;
    Ok(ApiResponse {
        status,
        version,
        body,
    })
}
