//! Tag and label model.
//!
//! Cloud providers and the registry describe key/value metadata in slightly
//! different shapes: EC2 tags arrive as `{Key, Value}`, registry labels as
//! `{name, value}`, and internal config as `{key, value}`. Everything is
//! normalized into [`Tag`] before any matching happens.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors produced by tag normalization and pattern compilation.
#[derive(Debug, Error)]
pub enum TagError {
    /// The raw object carries neither a recognized key field nor a
    /// recognized value field.
    #[error("unrecognized tag shape: {0}")]
    InvalidShape(String),
    /// A selector value pattern failed to compile.
    #[error("invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A normalized key/value tag.
///
/// Two tags are equal iff both key and value are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Normalizes a raw JSON object into a tag.
    ///
    /// Accepts `{key, value}`, `{Key, Value}`, and `{name, value}` shapes.
    pub fn from_value(raw: &Value) -> Result<Self, TagError> {
        let key = raw
            .get("key")
            .or_else(|| raw.get("Key"))
            .or_else(|| raw.get("name"))
            .and_then(Value::as_str);
        let value = raw
            .get("value")
            .or_else(|| raw.get("Value"))
            .and_then(Value::as_str);
        match (key, value) {
            (Some(k), Some(v)) => Ok(Tag::new(k, v)),
            _ => Err(TagError::InvalidShape(raw.to_string())),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// A tag key paired with a value pattern compiled once at construction.
///
/// The pattern is immutable after construction and is matched with prefix
/// semantics: it must match starting at the first character of the candidate
/// value, but need not consume the whole value unless it anchors the end
/// itself.
#[derive(Debug, Clone)]
pub struct CompiledTag {
    key: String,
    pattern: Regex,
}

impl CompiledTag {
    pub fn new(key: impl Into<String>, pattern: &str) -> Result<Self, TagError> {
        let compiled = Regex::new(pattern).map_err(|source| TagError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            key: key.into(),
            pattern: compiled,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns whether the pattern matches `candidate` starting at position 0.
    pub fn matches(&self, candidate: &str) -> bool {
        self.pattern
            .find(candidate)
            .map_or(false, |m| m.start() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_lowercase_shape() {
        let tag = Tag::from_value(&json!({"key": "Name", "value": "web-1"})).unwrap();
        assert_eq!(tag, Tag::new("Name", "web-1"));
    }

    #[test]
    fn test_from_value_provider_shape() {
        let tag = Tag::from_value(&json!({"Key": "Name", "Value": "web-1"})).unwrap();
        assert_eq!(tag, Tag::new("Name", "web-1"));
    }

    #[test]
    fn test_from_value_registry_shape() {
        let tag = Tag::from_value(&json!({"name": "env", "value": "prod"})).unwrap();
        assert_eq!(tag, Tag::new("env", "prod"));
    }

    #[test]
    fn test_from_value_missing_key_fails() {
        let err = Tag::from_value(&json!({"value": "prod"})).unwrap_err();
        assert!(matches!(err, TagError::InvalidShape(_)));
    }

    #[test]
    fn test_from_value_missing_value_fails() {
        let err = Tag::from_value(&json!({"Key": "Name"})).unwrap_err();
        assert!(matches!(err, TagError::InvalidShape(_)));
    }

    #[test]
    fn test_tag_equality() {
        assert_eq!(Tag::new("k", "v"), Tag::new("k", "v"));
        assert_ne!(Tag::new("k", "v"), Tag::new("k", "w"));
        assert_ne!(Tag::new("k", "v"), Tag::new("j", "v"));
    }

    #[test]
    fn test_compiled_tag_prefix_semantics() {
        let tag = CompiledTag::new("k", r"k\d{1,2}$").unwrap();
        assert!(tag.matches("k1"));
        assert!(tag.matches("k11"));
        assert!(!tag.matches("k"));
        assert!(!tag.matches("k111"));
    }

    #[test]
    fn test_compiled_tag_anchors_at_start() {
        let tag = CompiledTag::new("k", "prod").unwrap();
        assert!(tag.matches("prod-web"));
        assert!(!tag.matches("pre-prod"));
    }

    #[test]
    fn test_compiled_tag_invalid_pattern() {
        let err = CompiledTag::new("k", "(unclosed").unwrap_err();
        assert!(matches!(err, TagError::InvalidPattern { .. }));
    }
}
