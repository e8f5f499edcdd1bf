//! Read/write gateway backed by the remote library API.

use serde_json::{json, Value};

use super::models::{ChildItem, Collection, LibraryItem, WriteOutcome};
use super::{Gateway, GatewayError, GatewayKind};
use crate::transport::{ApiResponse, LibraryClient, TransportError};

/// Gateway that reads and writes through a [`LibraryClient`].
///
/// Conditioned writes carry both the caller's item version in the payload
/// and the session baseline as a precondition header. Callers are expected
/// to fetch the item immediately before writing.
pub struct RemoteGateway {
    client: LibraryClient,
}

impl RemoteGateway {
    pub fn new(client: LibraryClient) -> Self {
        Self { client }
    }

    /// Converts a not-found error into `None`.
    fn optional(
        result: Result<ApiResponse, TransportError>,
    ) -> Result<Option<ApiResponse>, GatewayError> {
        match result {
            Ok(response) => Ok(Some(response)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_optional(
        result: Result<Vec<Value>, TransportError>,
    ) -> Result<Vec<Value>, GatewayError> {
        match result {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn patch_item(
        &self,
        key: &str,
        payload: Value,
        version_check: bool,
    ) -> Result<WriteOutcome, GatewayError> {
        let response = self
            .client
            .patch(&format!("items/{key}"), &payload, version_check)?;
        if response.is_conflict() {
            tracing::info!("Version conflict writing item {}", key);
            Ok(WriteOutcome::Conflict)
        } else {
            Ok(WriteOutcome::Applied)
        }
    }
}

/// Extracts the created key from a multi-object write response.
///
/// The store answers `{"successful": {"0": {"key": ...}}, "failed": {...}}`.
fn parse_write_response(response: &ApiResponse) -> Result<String, GatewayError> {
    let body: Value = response.json()?;

    if let Some(key) = body
        .get("successful")
        .and_then(Value::as_object)
        .and_then(|m| m.values().next())
        .and_then(|entry| entry.get("key"))
        .and_then(Value::as_str)
    {
        return Ok(key.to_string());
    }

    let reason = body
        .get("failed")
        .and_then(Value::as_object)
        .and_then(|m| m.values().next())
        .and_then(|entry| entry.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no object was created");
    Err(GatewayError::WriteRejected(reason.to_string()))
}

impl Gateway for RemoteGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Remote
    }

    fn get_item(&self, key: &str) -> Result<Option<LibraryItem>, GatewayError> {
        let Some(response) = Self::optional(self.client.get(&format!("items/{key}"), &[]))? else {
            tracing::debug!("Item {} not found", key);
            return Ok(None);
        };
        let entry: Value = response.json()?;
        LibraryItem::from_api(&entry)
            .map(Some)
            .ok_or_else(|| TransportError::InvalidResponse(format!("item {key} has no key")).into())
    }

    fn get_item_children(&self, key: &str) -> Result<Vec<ChildItem>, GatewayError> {
        let entries = Self::list_optional(
            self.client
                .get_paginated(&format!("items/{key}/children"), &[]),
        )?;
        Ok(entries.iter().filter_map(ChildItem::from_api).collect())
    }

    fn get_items_in_collection(
        &self,
        collection_key: &str,
    ) -> Result<Vec<LibraryItem>, GatewayError> {
        let entries = self
            .client
            .get_paginated(&format!("collections/{collection_key}/items/top"), &[])?;
        Ok(entries.iter().filter_map(LibraryItem::from_api).collect())
    }

    fn get_all_collections(&self) -> Result<Vec<Collection>, GatewayError> {
        let entries = self.client.get_paginated("collections", &[])?;
        Ok(entries.iter().filter_map(Collection::from_api).collect())
    }

    fn create_note(&self, parent_key: &str, body: &str) -> Result<String, GatewayError> {
        let payload = json!([{
            "itemType": "note",
            "parentItem": parent_key,
            "note": body,
        }]);
        let response = self.client.post("items", &payload)?;
        let key = parse_write_response(&response)?;
        tracing::debug!("Created note {} on {}", key, parent_key);
        Ok(key)
    }

    fn update_note(
        &self,
        key: &str,
        version: u64,
        body: &str,
    ) -> Result<WriteOutcome, GatewayError> {
        self.patch_item(key, json!({"note": body, "version": version}), false)
    }

    fn update_item_collections(
        &self,
        key: &str,
        version: u64,
        collection_keys: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        self.patch_item(
            key,
            json!({"collections": collection_keys, "version": version}),
            true,
        )
    }

    fn update_item_tags(
        &self,
        key: &str,
        version: u64,
        tags: &[String],
    ) -> Result<WriteOutcome, GatewayError> {
        let tags: Vec<Value> = tags.iter().map(|t| json!({"tag": t})).collect();
        self.patch_item(key, json!({"tags": tags, "version": version}), true)
    }

    fn delete_item(&self, key: &str, version: u64) -> Result<WriteOutcome, GatewayError> {
        let response = self.client.delete(&format!("items/{key}"), &[], true);
        match response {
            Ok(response) if response.is_conflict() => {
                tracing::info!("Version conflict deleting {} (had version {})", key, version);
                Ok(WriteOutcome::Conflict)
            }
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Item {} already gone", key);
                Ok(WriteOutcome::Applied)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> ApiResponse {
        ApiResponse {
            status: 200,
            version: Some(10),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_write_response_success() {
        let r = response(r#"{"successful": {"0": {"key": "NOTE9", "version": 11}}, "failed": {}}"#);
        assert_eq!(parse_write_response(&r).unwrap(), "NOTE9");
    }

    #[test]
    fn test_parse_write_response_failed() {
        let r = response(r#"{"successful": {}, "failed": {"0": {"code": 400, "message": "bad parent"}}}"#);
        match parse_write_response(&r) {
            Err(GatewayError::WriteRejected(msg)) => assert_eq!(msg, "bad parent"),
            other => panic!("Expected WriteRejected, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_write_response_invalid_json() {
        let r = response("<html>");
        assert!(matches!(
            parse_write_response(&r),
            Err(GatewayError::Transport(TransportError::InvalidResponse(_)))
        ));
    }
}
