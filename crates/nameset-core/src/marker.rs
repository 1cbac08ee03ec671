//! Identity marker codec.
//!
//! The marker is a small payload attached to an archive through an external
//! comment facility. Written as a pretty-printed JSON object; the parser is
//! deliberately permissive and also accepts plain `ID: <value>` lines so
//! markers written by older tooling still resolve.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::ArchiveId;

/// The tool tag written into freshly minted markers.
pub const CREATED_BY: &str = "nameset";

/// Structured identity payload carried in an archive comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMarker {
    pub id: ArchiveId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Any additional keys found in (or written into) the marker.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl IdentityMarker {
    #[must_use]
    pub fn new(id: ArchiveId) -> Self {
        Self {
            id,
            artist_name: None,
            created_by: Some(CREATED_BY.to_string()),
            created_at: Some(Utc::now()),
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_artist(mut self, artist_name: Option<String>) -> Self {
        self.artist_name = artist_name;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Serialize to the comment text written into the archive.
    #[must_use]
    pub fn to_comment(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            // A marker is plain data; serialization cannot realistically
            // fail, but the id line keeps the marker recoverable if it does.
            format!("id: {}", self.id)
        })
    }

    /// Parse a comment into a marker, accepting a JSON object (key `id` or
    /// `archive_id`) or plain key-value lines. Returns `None` when no id can
    /// be recovered.
    #[must_use]
    pub fn parse(comment: &str) -> Option<Self> {
        let comment = comment.trim();
        if comment.is_empty() {
            return None;
        }

        if let Ok(value) = serde_json::from_str::<Value>(comment) {
            if let Some(marker) = Self::from_json(&value) {
                return Some(marker);
            }
        }

        Self::from_plain_lines(comment)
    }

    /// Convenience: just the id, if any.
    #[must_use]
    pub fn extract_id(comment: &str) -> Option<ArchiveId> {
        Self::parse(comment).map(|m| m.id)
    }

    fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = object
            .get("id")
            .or_else(|| object.get("archive_id"))
            .and_then(Value::as_str)
            .and_then(ArchiveId::new)?;

        let mut extra = serde_json::Map::new();
        for (key, val) in object {
            if !matches!(
                key.as_str(),
                "id" | "archive_id" | "artist_name" | "created_by" | "created_at"
            ) {
                extra.insert(key.clone(), val.clone());
            }
        }

        Some(Self {
            id,
            artist_name: object
                .get("artist_name")
                .and_then(Value::as_str)
                .map(String::from),
            created_by: object
                .get("created_by")
                .and_then(Value::as_str)
                .map(String::from),
            created_at: object
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(Into::into),
            extra,
        })
    }

    fn from_plain_lines(comment: &str) -> Option<Self> {
        static LINE_RE: OnceLock<Regex> = OnceLock::new();
        let re = LINE_RE.get_or_init(|| {
            // Fixed pattern; checked by tests.
            #[allow(clippy::unwrap_used)]
            let re = Regex::new(r"(?im)^\s*(?:archive_)?id\s*:\s*(\S[^\r\n]*)").unwrap();
            re
        });

        let captures = re.captures(comment)?;
        let id = ArchiveId::new(captures.get(1)?.as_str())?;
        Some(Self {
            id,
            artist_name: None,
            created_by: None,
            created_at: None,
            extra: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let marker = IdentityMarker::new(ArchiveId::mint())
            .with_artist(Some("X".to_string()));
        let parsed = IdentityMarker::parse(&marker.to_comment()).unwrap();
        assert_eq!(parsed.id, marker.id);
        assert_eq!(parsed.artist_name.as_deref(), Some("X"));
        assert_eq!(parsed.created_by.as_deref(), Some(CREATED_BY));
    }

    #[test]
    fn test_parse_json_archive_id_key() {
        let parsed =
            IdentityMarker::parse(r#"{"archive_id": "AB12CD34EF56"}"#).unwrap();
        assert_eq!(parsed.id.as_str(), "AB12CD34EF56");
    }

    #[test]
    fn test_parse_plain_lines() {
        for comment in [
            "ID: AB12CD34EF56",
            "id: AB12CD34EF56",
            "archive_id: AB12CD34EF56",
            "some header\nID: AB12CD34EF56\ntrailing",
        ] {
            let parsed = IdentityMarker::parse(comment).unwrap();
            assert_eq!(parsed.id.as_str(), "AB12CD34EF56", "comment: {comment}");
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(IdentityMarker::parse("").is_none());
        assert!(IdentityMarker::parse("no marker here").is_none());
        assert!(IdentityMarker::parse(r#"{"name": "x"}"#).is_none());
        assert!(IdentityMarker::parse("id:").is_none());
    }

    #[test]
    fn test_extra_keys_survive() {
        let marker = IdentityMarker::new(ArchiveId::mint())
            .with_extra("matched_from", Value::String("database".to_string()));
        let parsed = IdentityMarker::parse(&marker.to_comment()).unwrap();
        assert_eq!(
            parsed.extra.get("matched_from").and_then(Value::as_str),
            Some("database")
        );
    }
}
