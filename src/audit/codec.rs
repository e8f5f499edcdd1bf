//! Parsing and migration of audit note bodies.
//!
//! A note body is markup around a single JSON object. Parsing slices from
//! the first `{` to the last `}`, so surrounding markup of any shape is
//! tolerated. The object only counts as an audit record if it carries a
//! marker: `"action": "screening_decision"`, `audit_version` or
//! `sdb_version`.
//!
//! Migration rewrites legacy payloads into the canonical "1.1" shape. It is
//! idempotent and preserves key order, so repeated scans of a collection
//! never rewrite an already-canonical note.

use serde_json::{Map, Value};

use super::record::{split_codes, wrap_payload};
use super::{AUDIT_VERSION, CANONICAL_AGENT, SCREENING_ACTION, TOOL_VARIANTS};

pub type Payload = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Note body contains no JSON object")]
    NoPayload,

    #[error("Note payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Note payload is not a JSON object")]
    NotAnObject,

    #[error("JSON payload carries no audit marker")]
    Unmarked,
}

/// Extracts and validates the audit payload of a note body.
pub fn extract_payload(body: &str) -> Result<Payload, CodecError> {
    let start = body.find('{').ok_or(CodecError::NoPayload)?;
    let end = body.rfind('}').ok_or(CodecError::NoPayload)?;
    if end < start {
        return Err(CodecError::NoPayload);
    }

    let value: Value = serde_json::from_str(&body[start..=end])?;
    let Value::Object(payload) = value else {
        return Err(CodecError::NotAnObject);
    };

    if !is_marked(&payload) {
        return Err(CodecError::Unmarked);
    }
    Ok(payload)
}

/// Parses a note body, returning `None` for anything that is not audit data.
pub fn parse_note(body: &str) -> Option<Payload> {
    match extract_payload(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!("Skipping note without audit data: {}", e);
            None
        }
    }
}

pub fn is_marked(payload: &Payload) -> bool {
    payload.get("action").and_then(Value::as_str) == Some(SCREENING_ACTION)
        || payload.contains_key("audit_version")
        || payload.contains_key("sdb_version")
}

/// Rewrites a payload into the canonical shape.
///
/// Returns the payload and whether anything changed.
pub fn migrate_payload(payload: Payload) -> (Payload, bool) {
    let original = payload.clone();
    let mut payload = payload;

    payload.shift_remove("signature");

    migrate_agent(&mut payload);

    if payload.contains_key("code") {
        if payload.contains_key("reason_code") {
            payload.shift_remove("code");
        } else {
            // Rename in place so the key keeps its position.
            payload = payload
                .into_iter()
                .map(|(k, v)| {
                    if k == "code" {
                        let list = match v {
                            Value::Array(items) => Value::Array(items),
                            scalar => Value::Array(vec![scalar]),
                        };
                        ("reason_code".to_string(), list)
                    } else {
                        (k, v)
                    }
                })
                .collect();
        }
    }

    if let Some(Value::String(codes)) = payload.get("reason_code") {
        let list = split_codes(codes).into_iter().map(Value::String).collect();
        payload.insert("reason_code".to_string(), Value::Array(list));
    }

    payload.insert(
        "audit_version".to_string(),
        Value::String(AUDIT_VERSION.to_string()),
    );

    let changed = payload != original;
    (payload, changed)
}

fn migrate_agent(payload: &mut Payload) {
    let canonical = Value::String(CANONICAL_AGENT.to_string());
    let agent = match payload.get("agent") {
        Some(Value::String(agent)) => agent.clone(),
        Some(Value::Null) | None => String::new(),
        Some(_) => {
            payload.insert("agent".to_string(), canonical);
            return;
        }
    };

    if agent == CANONICAL_AGENT {
        return;
    }

    if !agent.is_empty() && !TOOL_VARIANTS.contains(&agent.as_str()) {
        // A persona name recorded as the agent by older writers.
        let persona_unset = match payload.get("persona") {
            None | Some(Value::Null) => true,
            Some(Value::String(p)) => p.is_empty() || p == "unknown",
            Some(_) => false,
        };
        if persona_unset {
            payload.insert("persona".to_string(), Value::String(agent));
        }
    }
    payload.insert("agent".to_string(), canonical);
}

/// Migrates a note body.
///
/// Returns `None` when the body is not an audit note or is already
/// canonical, so callers never issue a no-op rewrite.
pub fn migrate_note(body: &str) -> Option<String> {
    let payload = parse_note(body)?;
    let (migrated, changed) = migrate_payload(payload);
    if !changed {
        return None;
    }
    match serde_json::to_string(&migrated) {
        Ok(json) => Some(wrap_payload(&json)),
        Err(e) => {
            tracing::warn!("Could not serialize migrated payload: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CANONICAL: &str = r#"<div>{"audit_version":"1.1","decision":"accepted","reason_code":["IC1"],"reason_text":"Relevant","persona":"p1","agent":"litaudit","phase":"title_abstract","timestamp":"2025-01-01T00:00:00Z","action":"screening_decision"}</div>"#;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_extract_payload_from_markup() {
        let body = "<p>Decision</p><div>{\"action\":\"screening_decision\",\"decision\":\"rejected\"}</div>";
        let parsed = extract_payload(body).unwrap();
        assert_eq!(parsed["decision"], "rejected");
    }

    #[test]
    fn test_extract_payload_errors() {
        assert!(matches!(extract_payload("plain note"), Err(CodecError::NoPayload)));
        assert!(matches!(extract_payload("} backwards {"), Err(CodecError::NoPayload)));
        assert!(matches!(
            extract_payload("<div>{\"audit_version\": \"1.1\", </div>}"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            extract_payload("<div>{\"title\": \"reading list\"}</div>"),
            Err(CodecError::Unmarked)
        ));
    }

    #[test]
    fn test_unbalanced_braces_yield_no_audit_data() {
        assert!(parse_note("<div>{\"audit_version\": \"1.1\"</div>").is_none());
        assert!(parse_note("<div>{{\"audit_version\": \"1.1\"}</div>").is_none());
        assert!(parse_note("").is_none());
    }

    #[test]
    fn test_each_marker_is_recognized() {
        assert!(parse_note(r#"{"action":"screening_decision"}"#).is_some());
        assert!(parse_note(r#"{"audit_version":"1.0"}"#).is_some());
        assert!(parse_note(r#"{"sdb_version":"0.9"}"#).is_some());
        assert!(parse_note(r#"{"action":"bookmark"}"#).is_none());
    }

    #[test]
    fn test_canonical_note_is_not_rewritten() {
        assert_eq!(migrate_note(CANONICAL), None);

        let parsed = parse_note(CANONICAL).unwrap();
        let (once, changed) = migrate_payload(parsed.clone());
        assert!(!changed);
        let (twice, changed) = migrate_payload(once.clone());
        assert!(!changed);
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
        assert_eq!(
            wrap_payload(&serde_json::to_string(&twice).unwrap()),
            CANONICAL
        );
    }

    #[test]
    fn test_legacy_signature_and_agent() {
        let body = r#"<div>{"signature":"Dr. X","decision":"accepted","agent":"legacy-tool","audit_version":"1.0"}</div>"#;
        let migrated = migrate_note(body).unwrap();

        assert!(migrated.contains(r#""agent":"litaudit""#));
        assert!(migrated.contains(r#""persona":"legacy-tool""#));
        assert!(migrated.contains(r#""audit_version":"1.1""#));
        assert!(!migrated.contains("signature"));
        assert_eq!(
            migrated,
            r#"<div>{"decision":"accepted","agent":"litaudit","audit_version":"1.1","persona":"legacy-tool"}</div>"#
        );
    }

    #[test]
    fn test_migration_is_idempotent() {
        let body = r#"<div>{"signature":"Dr. X","decision":"rejected","code":"EC3","agent":"reviewer-b","audit_version":"1.0"}</div>"#;
        let once = migrate_note(body).unwrap();
        assert_eq!(migrate_note(&once), None);
    }

    #[test]
    fn test_scalar_code_becomes_reason_code() {
        let (migrated, changed) = migrate_payload(payload(json!({
            "decision": "rejected",
            "code": "EC2",
            "phase": "full_text",
            "audit_version": "1.0"
        })));
        assert!(changed);
        assert_eq!(migrated["reason_code"], json!(["EC2"]));
        assert!(!migrated.contains_key("code"));

        let keys: Vec<&str> = migrated.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["decision", "reason_code", "phase", "audit_version", "agent"]);
    }

    #[test]
    fn test_code_dropped_when_reason_code_present() {
        let (migrated, _) = migrate_payload(payload(json!({
            "audit_version": "1.1",
            "reason_code": ["IC1"],
            "code": "EC9",
            "agent": "litaudit"
        })));
        assert_eq!(migrated["reason_code"], json!(["IC1"]));
        assert!(!migrated.contains_key("code"));
    }

    #[test]
    fn test_comma_separated_reason_code_is_split() {
        let (migrated, changed) = migrate_payload(payload(json!({
            "audit_version": "1.1",
            "agent": "litaudit",
            "reason_code": "EC1, EC2"
        })));
        assert!(changed);
        assert_eq!(migrated["reason_code"], json!(["EC1", "EC2"]));
    }

    #[test]
    fn test_tool_variant_agent_is_normalized_without_persona_move() {
        let (migrated, changed) = migrate_payload(payload(json!({
            "audit_version": "1.1",
            "agent": "litaudit-tui",
            "persona": "unknown"
        })));
        assert!(changed);
        assert_eq!(migrated["agent"], "litaudit");
        assert_eq!(migrated["persona"], "unknown");
    }

    #[test]
    fn test_existing_persona_is_kept() {
        let (migrated, _) = migrate_payload(payload(json!({
            "audit_version": "1.0",
            "agent": "reviewer-b",
            "persona": "p2"
        })));
        assert_eq!(migrated["persona"], "p2");
        assert_eq!(migrated["agent"], "litaudit");
    }

    #[test]
    fn test_missing_agent_is_stamped() {
        let (migrated, changed) = migrate_payload(payload(json!({"sdb_version": "0.9"})));
        assert!(changed);
        assert_eq!(migrated["agent"], "litaudit");
        assert_eq!(migrated["audit_version"], "1.1");
        assert!(!migrated.contains_key("persona"));
    }

    #[test]
    fn test_non_audit_note_is_left_alone() {
        assert_eq!(migrate_note("<p>Read chapter 3 again</p>"), None);
        assert_eq!(migrate_note("<div>{\"decision\":\"accepted\"}</div>"), None);
    }
}
