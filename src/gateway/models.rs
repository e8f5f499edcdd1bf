//! Core data models for library entities.
//!
//! These represent items, child notes/attachments and collections
//! independent of which backend produced them. Values are only ever built
//! from store data; the client never invents a version.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Item type of child notes.
pub const NOTE_TYPE: &str = "note";

/// Item type of child attachments.
pub const ATTACHMENT_TYPE: &str = "attachment";

/// A bibliographic item in the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    /// Opaque, immutable item key
    pub key: String,

    /// Server-assigned version, used as the concurrency token
    pub version: u64,

    /// Item type (e.g., "journalArticle", "note")
    pub item_type: String,

    /// Keys of the collections containing this item
    pub collections: Vec<String>,

    /// Tag labels
    pub tags: Vec<String>,

    pub title: Option<String>,
    pub abstract_note: Option<String>,
    pub doi: Option<String>,

    /// External identifier (arXiv id) recovered from `extra` or `url`
    pub external_id: Option<String>,

    pub url: Option<String>,
    pub date: Option<String>,

    /// Author display names in creator order
    pub authors: Vec<String>,

    /// Whether a PDF attachment is known to exist
    pub has_pdf: bool,
}

impl LibraryItem {
    /// Builds an item from an API entry (`{"key", "version", "data": {...}}`).
    pub fn from_api(entry: &Value) -> Option<Self> {
        let key = entry.get("key")?.as_str()?.to_string();
        let data = entry.get("data").cloned().unwrap_or(Value::Null);
        let data: ItemData = serde_json::from_value(data).unwrap_or_default();

        let version = data
            .version
            .or_else(|| entry.get("version").and_then(Value::as_u64))
            .unwrap_or(0);

        Some(Self {
            external_id: extract_external_id(data.extra.as_deref(), data.url.as_deref()),
            key,
            version,
            item_type: data.item_type.unwrap_or_else(|| "unknown".to_string()),
            collections: data.collections,
            tags: data.tags.into_iter().map(|t| t.tag).collect(),
            title: non_empty(data.title),
            abstract_note: non_empty(data.abstract_note),
            doi: non_empty(data.doi),
            url: non_empty(data.url),
            date: non_empty(data.date),
            authors: data.creators.iter().filter_map(Creator::author_name).collect(),
            has_pdf: false,
        })
    }

    /// Whether this is a child entity rather than a top-level record.
    pub fn is_child(&self) -> bool {
        self.item_type == NOTE_TYPE || self.item_type == ATTACHMENT_TYPE
    }

    /// Whether the item carries a DOI or an external identifier.
    pub fn has_identifier(&self) -> bool {
        self.doi.is_some() || self.external_id.is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A child note or attachment of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildItem {
    pub key: String,
    pub version: u64,
    pub item_type: String,

    /// Note body (notes only)
    pub note: Option<String>,

    /// MIME type (attachments only)
    pub content_type: Option<String>,

    /// Link mode (attachments only)
    pub link_mode: Option<String>,

    /// File name (attachments only)
    pub filename: Option<String>,
}

impl ChildItem {
    /// Builds a child from an API entry. Accepts both the wrapped
    /// `{"key", "data": {...}}` form and a bare data object.
    pub fn from_api(entry: &Value) -> Option<Self> {
        let data = entry.get("data").unwrap_or(entry);
        let key = entry
            .get("key")
            .or_else(|| data.get("key"))?
            .as_str()?
            .to_string();
        let version = data
            .get("version")
            .or_else(|| entry.get("version"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let text = |field: &str| data.get(field).and_then(Value::as_str).map(str::to_string);

        Some(Self {
            key,
            version,
            item_type: text("itemType").unwrap_or_else(|| "unknown".to_string()),
            note: text("note"),
            content_type: text("contentType"),
            link_mode: text("linkMode"),
            filename: text("filename"),
        })
    }

    pub fn is_note(&self) -> bool {
        self.item_type == NOTE_TYPE
    }

    pub fn is_attachment(&self) -> bool {
        self.item_type == ATTACHMENT_TYPE
    }

    /// Whether this is a stored PDF file.
    pub fn is_pdf(&self) -> bool {
        self.is_attachment()
            && (self.content_type.as_deref() == Some("application/pdf")
                || self
                    .filename
                    .as_deref()
                    .is_some_and(|f| f.to_lowercase().ends_with(".pdf")))
    }
}

/// A named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub key: String,
    pub name: String,
    pub parent_key: Option<String>,
}

impl Collection {
    /// Builds a collection from an API entry.
    pub fn from_api(entry: &Value) -> Option<Self> {
        let key = entry.get("key")?.as_str()?.to_string();
        let data = entry.get("data")?;
        let name = data.get("name")?.as_str()?.to_string();
        let parent_key = data
            .get("parentCollection")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            key,
            name,
            parent_key,
        })
    }
}

/// Result of a version-checked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store accepted the write.
    Applied,
    /// Another writer changed the target first; nothing was written.
    Conflict,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        self == WriteOutcome::Applied
    }
}

/// Wire shape of an item's `data` object.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemData {
    version: Option<u64>,
    item_type: Option<String>,
    title: Option<String>,
    abstract_note: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    url: Option<String>,
    extra: Option<String>,
    date: Option<String>,
    creators: Vec<Creator>,
    collections: Vec<String>,
    tags: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    tag: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Creator {
    creator_type: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    name: Option<String>,
}

impl Creator {
    fn author_name(&self) -> Option<String> {
        if self.creator_type.as_deref() != Some("author") {
            return None;
        }
        match (&self.first_name, &self.last_name, &self.name) {
            (Some(first), Some(last), _) => Some(format!("{first} {last}").trim().to_string()),
            (None, Some(last), _) => Some(last.clone()),
            (_, _, Some(name)) => Some(name.clone()),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Recovers an arXiv identifier from the `extra` field or an arxiv.org URL.
pub fn extract_external_id(extra: Option<&str>, url: Option<&str>) -> Option<String> {
    static EXTRA_RE: OnceLock<Regex> = OnceLock::new();
    static URL_RE: OnceLock<Regex> = OnceLock::new();

    let extra_re = EXTRA_RE.get_or_init(|| {
        Regex::new(r"(?i)arXiv:\s*([\d.]+(?:v\d+)?)").expect("valid arXiv extra pattern")
    });
    let url_re = URL_RE.get_or_init(|| {
        Regex::new(r"arxiv\.org/(?:abs|pdf)/([\d.]+)").expect("valid arXiv url pattern")
    });

    if let Some(caps) = extra.and_then(|e| extra_re.captures(e)) {
        return Some(caps[1].to_string());
    }
    url.and_then(|u| url_re.captures(u)).map(|caps| caps[1].to_string())
}
