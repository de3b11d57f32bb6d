//! Chat message and room types.
//!
//! Messages are kept as schema-less JSON trees: the room history API returns
//! events whose shape varies with the message type (plain text, notifications
//! with cards, link previews, and so on), and filters only ever look at key
//! presence or a handful of well-known fields.
//!
//! # Example
//!
//! ```rust
//! use roomwatch::source::Message;
//!
//! let message = Message::new(serde_json::json!({
//!     "id": "8a2f",
//!     "from": {"name": "Ada"},
//!     "message": "deploy finished",
//!     "card": {"style": "link", "url": "https://example.com"}
//! }));
//!
//! assert_eq!(message.id().as_deref(), Some("8a2f"));
//! assert_eq!(message.sender().as_deref(), Some("Ada"));
//! assert!(message.keys().contains("url"));
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Maximum nesting depth walked when collecting message keys.
///
/// Subtrees below this depth are not inspected.
pub const MAX_KEY_DEPTH: usize = 64;

/// A single chat room event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(JsonValue);

impl Message {
    /// Wrap a JSON value as a message.
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// Message identifier, used as the watermark.
    ///
    /// String ids are returned as-is; numeric ids are rendered in decimal.
    /// Returns `None` when the message carries no usable `id` field.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            JsonValue::String(id) if !id.is_empty() => Some(id.clone()),
            JsonValue::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// The message body (`message` field), if it is a string.
    pub fn text(&self) -> Option<&str> {
        self.0.get("message").and_then(JsonValue::as_str)
    }

    /// Display name of the sender.
    ///
    /// The history API reports users as objects with a `name` and
    /// integrations as a bare string.
    pub fn sender(&self) -> Option<String> {
        match self.0.get("from")? {
            JsonValue::String(name) => Some(name.clone()),
            JsonValue::Object(user) => user
                .get("name")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Message timestamp parsed from the RFC 3339 `date` field.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.0
            .get("date")
            .and_then(JsonValue::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    }

    /// Every object key present anywhere in the message.
    pub fn keys(&self) -> BTreeSet<&str> {
        collect_keys(&self.0, MAX_KEY_DEPTH)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &JsonValue {
        &self.0
    }

    /// Consume the message, returning the underlying JSON value.
    pub fn into_value(self) -> JsonValue {
        self.0
    }
}

impl From<JsonValue> for Message {
    fn from(value: JsonValue) -> Self {
        Self::new(value)
    }
}

/// Collect the keys of every object in `value`, at any nesting depth.
///
/// Objects nested inside arrays are included. Traversal uses an explicit
/// stack and stops descending below `max_depth` levels.
///
/// # Examples
///
/// ```
/// use roomwatch::source::message::collect_keys;
///
/// let value = serde_json::json!({"a": {"b": [{"c": 1}]}});
/// let keys = collect_keys(&value, 8);
/// assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
/// ```
pub fn collect_keys(value: &JsonValue, max_depth: usize) -> BTreeSet<&str> {
    let mut keys = BTreeSet::new();
    let mut stack = vec![(value, 0usize)];

    while let Some((node, depth)) = stack.pop() {
        if depth >= max_depth {
            continue;
        }
        match node {
            JsonValue::Object(map) => {
                for (key, child) in map {
                    keys.insert(key.as_str());
                    stack.push((child, depth + 1));
                }
            }
            JsonValue::Array(items) => {
                stack.extend(items.iter().map(|item| (item, depth + 1)));
            }
            _ => {}
        }
    }

    keys
}

/// A chat room as reported by the message source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Upstream room identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Human-readable room name.
    pub name: String,
    /// Room topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Privacy setting ("public" or "private").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
}

impl Room {
    /// Create a room with only an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            topic: None,
            privacy: None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number room id, got {}",
            other
        ))),
    }
}
