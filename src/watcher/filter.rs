//! Message filtering
//!
//! This module decides which messages are handed to the message handler.
//! A [`MessageFilter`] combines three checks, evaluated in order:
//!
//! 1. every mandatory field is present somewhere in the message
//! 2. no forbidden field is present anywhere in the message
//! 3. a custom predicate accepts the message
//!
//! A [`FilterChain`] requires a message to pass every filter it holds.

use crate::config::FilterConfig;
use crate::error::{Result, RoomWatchError};
use crate::source::Message;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Custom message predicate.
pub type Validator = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// A single message filter.
///
/// # Examples
///
/// ```
/// use roomwatch::source::Message;
/// use roomwatch::watcher::MessageFilter;
/// use serde_json::json;
///
/// let filter = MessageFilter::new()
///     .with_mandatory_fields(["card"])
///     .with_without_fields(["deleted"]);
///
/// let card = Message::new(json!({"id": "1", "card": {"url": "https://example.com"}}));
/// let plain = Message::new(json!({"id": "2", "message": "hi"}));
///
/// assert!(filter.is_ok(&card));
/// assert!(!filter.is_ok(&plain));
/// ```
#[derive(Clone, Default)]
pub struct MessageFilter {
    mandatory_fields: Option<BTreeSet<String>>,
    without_fields: Option<BTreeSet<String>>,
    pattern: Option<Regex>,
    validator: Option<Validator>,
}

impl MessageFilter {
    /// Create a filter that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RoomWatchError::Config` if `message_pattern` is not a valid regex.
    ///
    /// # Examples
    ///
    /// ```
    /// use roomwatch::config::FilterConfig;
    /// use roomwatch::watcher::MessageFilter;
    ///
    /// let config = FilterConfig {
    ///     mandatory_fields: Some(vec!["message_links".to_string()]),
    ///     without_fields: None,
    ///     message_pattern: None,
    /// };
    ///
    /// let filter = MessageFilter::from_config(&config).unwrap();
    /// assert_eq!(filter.summary(), "requires=message_links");
    /// ```
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let mut filter = Self::new();

        if let Some(fields) = &config.mandatory_fields {
            filter = filter.with_mandatory_fields(fields);
        }

        if let Some(fields) = &config.without_fields {
            filter = filter.with_without_fields(fields);
        }

        if let Some(pattern) = &config.message_pattern {
            let regex = Regex::new(pattern).map_err(|e| {
                RoomWatchError::Config(format!("Invalid message pattern {}: {}", pattern, e))
            })?;
            filter.pattern = Some(regex);
        }

        Ok(filter)
    }

    /// Require every one of `fields` to appear as a key somewhere in the message.
    pub fn with_mandatory_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mandatory_fields = Some(fields.into_iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    /// Reject messages in which any of `fields` appears as a key.
    pub fn with_without_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.without_fields = Some(fields.into_iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    /// Install a custom predicate, checked after the field checks pass.
    ///
    /// # Examples
    ///
    /// ```
    /// use roomwatch::source::Message;
    /// use roomwatch::watcher::MessageFilter;
    /// use serde_json::json;
    ///
    /// // Only accept link cards pointing at the docs site.
    /// let filter = MessageFilter::new()
    ///     .with_mandatory_fields(["card"])
    ///     .with_validator(|message: &Message| {
    ///         message.as_value()["card"]["url"]
    ///             .as_str()
    ///             .map_or(false, |url| url.starts_with("https://docs."))
    ///     });
    ///
    /// let docs = Message::new(json!({"card": {"url": "https://docs.example.com"}}));
    /// let other = Message::new(json!({"card": {"url": "https://example.com"}}));
    /// assert!(filter.is_ok(&docs));
    /// assert!(!filter.is_ok(&other));
    /// ```
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Whether the message passes this filter.
    pub fn is_ok(&self, message: &Message) -> bool {
        self.has_mandatory_fields(message)
            && self.is_without_fields(message)
            && self.is_valid(message)
    }

    /// Every mandatory field appears somewhere in the message.
    ///
    /// Trivially true when no mandatory fields are configured.
    pub fn has_mandatory_fields(&self, message: &Message) -> bool {
        let Some(required) = &self.mandatory_fields else {
            return true;
        };

        let keys = message.keys();
        required.iter().all(|field| keys.contains(field.as_str()))
    }

    /// None of the forbidden fields appear anywhere in the message.
    ///
    /// Trivially true when no forbidden fields are configured.
    pub fn is_without_fields(&self, message: &Message) -> bool {
        let Some(forbidden) = &self.without_fields else {
            return true;
        };

        let keys = message.keys();
        !forbidden.iter().any(|field| keys.contains(field.as_str()))
    }

    /// Custom checks beyond field presence.
    ///
    /// True unless a configured message pattern does not match the message
    /// text, or an installed validator rejects the message.
    pub fn is_valid(&self, message: &Message) -> bool {
        if let Some(pattern) = &self.pattern {
            match message.text() {
                Some(text) if pattern.is_match(text) => {}
                _ => return false,
            }
        }

        self.validator
            .as_ref()
            .map_or(true, |validator| validator(message))
    }

    /// Human-readable summary of the active checks.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if let Some(fields) = &self.mandatory_fields {
            parts.push(format!("requires={}", join(fields)));
        }

        if let Some(fields) = &self.without_fields {
            parts.push(format!("excludes={}", join(fields)));
        }

        if let Some(pattern) = &self.pattern {
            parts.push(format!("message~{}", pattern.as_str()));
        }

        if self.validator.is_some() {
            parts.push("custom".to_string());
        }

        if parts.is_empty() {
            "accept all".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn join(fields: &BTreeSet<String>) -> String {
    fields.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

impl fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFilter")
            .field("mandatory_fields", &self.mandatory_fields)
            .field("without_fields", &self.without_fields)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// All filters a message must pass.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<MessageFilter>,
}

impl FilterChain {
    /// Create an empty chain, which accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from configuration, one filter per entry.
    pub fn from_configs(configs: &[FilterConfig]) -> Result<Self> {
        let filters = configs
            .iter()
            .map(MessageFilter::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    /// Append a filter.
    pub fn push(&mut self, filter: MessageFilter) {
        self.filters.push(filter);
    }

    /// Number of filters in the chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the chain holds no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether the message passes every filter.
    pub fn accepts(&self, message: &Message) -> bool {
        self.filters.iter().all(|filter| filter.is_ok(message))
    }

    /// Human-readable summary of the chain for logging.
    pub fn summary(&self) -> String {
        if self.filters.is_empty() {
            return "no filters (all messages)".to_string();
        }

        self.filters
            .iter()
            .map(MessageFilter::summary)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl From<Vec<MessageFilter>> for FilterChain {
    fn from(filters: Vec<MessageFilter>) -> Self {
        Self { filters }
    }
}

impl FromIterator<MessageFilter> for FilterChain {
    fn from_iter<I: IntoIterator<Item = MessageFilter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card_message() -> Message {
        Message::new(json!({
            "id": "1",
            "from": {"name": "Ada", "mention_name": "ada"},
            "message": "deploy finished",
            "card": {"style": "link", "url": "https://example.com", "description": {"format": "text"}},
        }))
    }

    fn plain_message() -> Message {
        Message::new(json!({
            "id": "2",
            "from": "JIRA",
            "message": "PROJ-1 updated",
        }))
    }

    #[test]
    fn test_default_filter_accepts_all() {
        let filter = MessageFilter::new();
        assert!(filter.is_ok(&card_message()));
        assert!(filter.is_ok(&plain_message()));
        assert!(filter.is_ok(&Message::new(json!(null))));
    }

    #[test]
    fn test_mandatory_fields_at_any_depth() {
        let filter = MessageFilter::new().with_mandatory_fields(["card", "format"]);
        assert!(filter.has_mandatory_fields(&card_message()));
        assert!(!filter.has_mandatory_fields(&plain_message()));
    }

    #[test]
    fn test_mandatory_fields_all_required() {
        let filter = MessageFilter::new().with_mandatory_fields(["card", "file"]);
        assert!(!filter.has_mandatory_fields(&card_message()));
    }

    #[test]
    fn test_empty_mandatory_set_passes() {
        let filter = MessageFilter::new().with_mandatory_fields(Vec::<String>::new());
        assert!(filter.has_mandatory_fields(&plain_message()));
    }

    #[test]
    fn test_without_fields_at_any_depth() {
        let filter = MessageFilter::new().with_without_fields(["mention_name"]);
        assert!(!filter.is_without_fields(&card_message()));
        assert!(filter.is_without_fields(&plain_message()));
    }

    #[test]
    fn test_field_names_match_keys_not_values() {
        let filter = MessageFilter::new().with_mandatory_fields(["link"]);
        assert!(!filter.is_ok(&card_message()));
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let filter = MessageFilter::new()
            .with_mandatory_fields(["card"])
            .with_validator(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            });

        assert!(!filter.is_ok(&plain_message()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(filter.is_ok(&card_message()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validator_rejects() {
        let filter = MessageFilter::new()
            .with_validator(|message| message.sender().as_deref() == Some("Ada"));
        assert!(filter.is_valid(&card_message()));
        assert!(!filter.is_valid(&plain_message()));
    }

    #[test]
    fn test_message_pattern() {
        let config = FilterConfig {
            message_pattern: Some("^deploy".to_string()),
            ..Default::default()
        };
        let filter = MessageFilter::from_config(&config).unwrap();
        assert!(filter.is_ok(&card_message()));
        assert!(!filter.is_ok(&plain_message()));
        assert!(!filter.is_ok(&Message::new(json!({"id": "3"}))));
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let config = FilterConfig {
            message_pattern: Some("[invalid(".to_string()),
            ..Default::default()
        };
        let err = MessageFilter::from_config(&config).unwrap_err();
        assert!(matches!(err, RoomWatchError::Config(_)));
    }

    #[test]
    fn test_from_config_combines_checks() {
        let config = FilterConfig {
            mandatory_fields: Some(vec!["card".to_string()]),
            without_fields: Some(vec!["deleted".to_string()]),
            message_pattern: None,
        };
        let filter = MessageFilter::from_config(&config).unwrap();

        let mut deleted = card_message().into_value();
        deleted["deleted"] = json!(true);

        assert!(filter.is_ok(&card_message()));
        assert!(!filter.is_ok(&Message::new(deleted)));
    }

    #[test]
    fn test_chain_and_law() {
        let needs_card = MessageFilter::new().with_mandatory_fields(["card"]);
        let from_ada =
            MessageFilter::new().with_validator(|m| m.sender().as_deref() == Some("Ada"));
        let chain = FilterChain::from(vec![needs_card.clone(), from_ada.clone()]);

        for message in [card_message(), plain_message()] {
            assert_eq!(
                chain.accepts(&message),
                needs_card.is_ok(&message) && from_ada.is_ok(&message)
            );
        }

        let mut bob = card_message().into_value();
        bob["from"] = json!({"name": "Bob"});
        assert!(!chain.accepts(&Message::new(bob)));
    }

    #[test]
    fn test_empty_chain_accepts_all() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert!(chain.accepts(&card_message()));
        assert!(chain.accepts(&plain_message()));
    }

    #[test]
    fn test_chain_from_configs() {
        let configs = vec![
            FilterConfig {
                mandatory_fields: Some(vec!["card".into()]),
                ..Default::default()
            },
            FilterConfig {
                without_fields: Some(vec!["file".into()]),
                ..Default::default()
            },
        ];
        let chain = FilterChain::from_configs(&configs).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.accepts(&card_message()));
    }

    #[test]
    fn test_chain_from_configs_propagates_errors() {
        let configs = vec![FilterConfig {
            message_pattern: Some("(".into()),
            ..Default::default()
        }];
        assert!(FilterChain::from_configs(&configs).is_err());
    }

    #[test]
    fn test_summaries() {
        assert_eq!(FilterChain::new().summary(), "no filters (all messages)");
        assert_eq!(MessageFilter::new().summary(), "accept all");

        let chain: FilterChain = vec![
            MessageFilter::new().with_mandatory_fields(["card", "attributes"]),
            MessageFilter::new()
                .with_without_fields(["file"])
                .with_validator(|_| true),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            chain.summary(),
            "requires=attributes,card; excludes=file, custom"
        );
    }
}
