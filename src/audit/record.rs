//! The screening decision record embedded in audit notes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AUDIT_VERSION, CANONICAL_AGENT, SCREENING_ACTION};

/// Outcome of screening one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    /// Accepts `include`/`exclude` as aliases, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accepted" | "accept" | "include" | "included" => Ok(Decision::Accepted),
            "rejected" | "reject" | "exclude" | "excluded" => Ok(Decision::Rejected),
            other => Err(format!(
                "Unknown decision '{other}'. Use accepted/include or rejected/exclude."
            )),
        }
    }
}

/// A screening decision in its canonical wire shape.
///
/// Field order here is the order written to notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_version: String,
    pub decision: Decision,
    pub reason_code: Vec<String>,
    pub reason_text: String,
    pub persona: String,
    pub agent: String,
    pub phase: String,
    pub timestamp: String,
    pub action: String,
}

impl AuditRecord {
    /// Stamps a new record with the current time and tool identity.
    pub fn new(
        decision: Decision,
        reason_code: Vec<String>,
        reason_text: &str,
        persona: &str,
        phase: &str,
    ) -> Self {
        Self::at(Utc::now(), decision, reason_code, reason_text, persona, phase)
    }

    pub fn at(
        now: DateTime<Utc>,
        decision: Decision,
        reason_code: Vec<String>,
        reason_text: &str,
        persona: &str,
        phase: &str,
    ) -> Self {
        Self {
            audit_version: AUDIT_VERSION.to_string(),
            decision,
            reason_code,
            reason_text: reason_text.to_string(),
            persona: persona.to_string(),
            agent: CANONICAL_AGENT.to_string(),
            phase: phase.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            action: SCREENING_ACTION.to_string(),
        }
    }

    /// Serializes the record as a note body: `<div>{compact json}</div>`.
    pub fn to_note_body(&self) -> Result<String, serde_json::Error> {
        Ok(wrap_payload(&serde_json::to_string(self)?))
    }

    /// Fast-path tag marking the review stage, `phase:<phase>`.
    pub fn phase_tag(&self) -> String {
        format!("phase:{}", self.phase)
    }

    /// Fast-path tag carrying the outcome, `<decision>:<codes>`.
    pub fn decision_tag(&self) -> String {
        format!("{}:{}", self.decision, self.reason_code.join(","))
    }
}

/// Wraps a serialized payload in the note markup.
pub fn wrap_payload(json: &str) -> String {
    format!("<div>{json}</div>")
}

/// Splits a comma-separated code list, trimming and dropping empties.
pub fn split_codes(codes: &str) -> Vec<String> {
    codes
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a tag is a decision tag written by the fast path.
pub fn is_decision_tag(tag: &str) -> bool {
    tag.starts_with("accepted:") || tag.starts_with("rejected:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_record() -> AuditRecord {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        AuditRecord::at(
            now,
            Decision::Accepted,
            vec!["IC1".to_string()],
            "Relevant",
            "p1",
            "title_abstract",
        )
    }

    #[test]
    fn test_decision_aliases() {
        assert_eq!("include".parse::<Decision>().unwrap(), Decision::Accepted);
        assert_eq!("Accepted".parse::<Decision>().unwrap(), Decision::Accepted);
        assert_eq!("exclude".parse::<Decision>().unwrap(), Decision::Rejected);
        assert_eq!("rejected".parse::<Decision>().unwrap(), Decision::Rejected);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_note_body_wire_format() {
        let body = fixed_record().to_note_body().unwrap();
        assert_eq!(
            body,
            r#"<div>{"audit_version":"1.1","decision":"accepted","reason_code":["IC1"],"reason_text":"Relevant","persona":"p1","agent":"litaudit","phase":"title_abstract","timestamp":"2025-01-01T00:00:00Z","action":"screening_decision"}</div>"#
        );
    }

    #[test]
    fn test_tags() {
        let mut record = fixed_record();
        assert_eq!(record.phase_tag(), "phase:title_abstract");
        assert_eq!(record.decision_tag(), "accepted:IC1");

        record.decision = Decision::Rejected;
        record.reason_code = vec!["EC1".to_string(), "EC2".to_string()];
        assert_eq!(record.decision_tag(), "rejected:EC1,EC2");
        assert!(is_decision_tag(&record.decision_tag()));
        assert!(!is_decision_tag("phase:title_abstract"));
    }

    #[test]
    fn test_split_codes() {
        assert_eq!(split_codes("EC1, EC2,,"), vec!["EC1", "EC2"]);
        assert!(split_codes(" ").is_empty());
    }
}
