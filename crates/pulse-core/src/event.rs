use crate::error::EventParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One webhook-derived occurrence as stored by the origin service.
///
/// `id` is globally unique and stable across re-fetches; `created_at` never
/// changes for a given `id` and is the authoritative ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetaValue>,
    pub created_at: DateTime<Utc>,
}

/// Provider-specific metadata value. Providers ship heterogeneous payloads,
/// so this stays an open string-keyed map with a small closed value union
/// rather than a per-provider struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl Event {
    /// Validate a raw upstream item. Events without an `id` or `created_at`
    /// cannot be deduplicated or ordered and are rejected here, before they
    /// reach the dedup cache or the hub.
    pub fn from_raw(raw: Value) -> Result<Self, EventParseError> {
        let event: Event = serde_json::from_value(raw)?;
        if event.id.is_empty() {
            return Err(EventParseError::EmptyId);
        }
        Ok(event)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetaValue::as_str)
    }

    /// First present value among `keys`, normalized to a comparable string.
    /// Numeric identifiers (PR numbers) arrive as either JSON numbers or
    /// strings depending on the provider.
    pub fn meta_ident(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.metadata.get(*key) {
            Some(MetaValue::Str(value)) => Some(value.clone()),
            Some(MetaValue::Num(value)) if value.fract() == 0.0 => {
                Some(format!("{}", *value as i64))
            }
            Some(MetaValue::Num(value)) => Some(value.to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_open_metadata() {
        let raw = json!({
            "id": "evt_1",
            "event_type": "github.push",
            "title": "push to main",
            "metadata": {
                "repo": "acme/site",
                "branch": "refs/heads/main",
                "commit_count": 3,
                "forced": false,
                "author": { "login": "dev" }
            },
            "created_at": "2025-06-01T12:00:00Z"
        });

        let event = Event::from_raw(raw).unwrap();
        assert_eq!(event.meta_str("repo"), Some("acme/site"));
        assert_eq!(event.meta_ident(&["commit_count"]), Some("3".to_string()));
        assert!(matches!(
            event.metadata.get("author"),
            Some(MetaValue::Map(_))
        ));
    }

    #[test]
    fn rejects_missing_identity() {
        let no_id = json!({
            "event_type": "github.push",
            "created_at": "2025-06-01T12:00:00Z"
        });
        assert!(Event::from_raw(no_id).is_err());

        let no_timestamp = json!({
            "id": "evt_1",
            "event_type": "github.push"
        });
        assert!(Event::from_raw(no_timestamp).is_err());

        let empty_id = json!({
            "id": "",
            "event_type": "github.push",
            "created_at": "2025-06-01T12:00:00Z"
        });
        assert!(matches!(
            Event::from_raw(empty_id),
            Err(EventParseError::EmptyId)
        ));
    }

    #[test]
    fn missing_title_and_metadata_default() {
        let raw = json!({
            "id": "evt_2",
            "event_type": "railway.deploy",
            "created_at": "2025-06-01T12:00:00Z"
        });
        let event = Event::from_raw(raw).unwrap();
        assert!(event.title.is_empty());
        assert!(event.metadata.is_empty());
    }

    #[test]
    fn pr_number_matches_across_json_types() {
        let as_number = json!({
            "id": "a",
            "event_type": "github.pr",
            "metadata": { "pr_number": 42 },
            "created_at": "2025-06-01T12:00:00Z"
        });
        let as_string = json!({
            "id": "b",
            "event_type": "github.pr",
            "metadata": { "number": "42" },
            "created_at": "2025-06-01T12:00:00Z"
        });
        let first = Event::from_raw(as_number).unwrap();
        let second = Event::from_raw(as_string).unwrap();
        assert_eq!(
            first.meta_ident(&["pr_number", "number"]),
            second.meta_ident(&["pr_number", "number"])
        );
    }
}
