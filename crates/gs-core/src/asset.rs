//! Instance asset record and provenance comment codec.

use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Separator between `key=value` pairs in the comment encoding.
const COMMENT_SEP: char = ';';
/// Separator between key and value within one pair.
const COMMENT_PAIR_SEP: char = '=';

/// A normalized compute instance tracked for access management.
///
/// Relational attributes come in pairs (`admin_user`/`admin_user_id`,
/// `domain`/`domain_id`, `labels`/`label_ids`, `nodes`/`node_ids`) carrying
/// the same reference in human-readable name form and registry id form. At
/// most one side of a pair is authoritative until the linking agent resolves
/// the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceAsset {
    /// Registry-assigned identifier, present once the asset exists remotely.
    pub id: Option<String>,
    /// Provider-assigned stable instance identifier; the reconciliation
    /// join key.
    pub number: Option<String>,
    /// Hostname registered with the registry.
    pub hostname: Option<String>,
    /// Login protocol.
    pub protocol: String,
    /// Private address used for login.
    pub ip: Option<String>,
    /// Public address, when the instance has one.
    pub public_ip: Option<String>,
    /// Login port.
    pub port: u16,
    /// Platform name as the registry expects it.
    pub platform: String,
    /// `key=value;`-encoded provenance metadata, see [`Self::put_comment`].
    pub comment: Option<String>,
    /// Admin credential name used to manage the asset.
    pub admin_user: Option<String>,
    /// Registry id of the admin credential.
    pub admin_user_id: Option<String>,
    /// Gateway domain name for reaching the asset.
    pub domain: Option<String>,
    /// Registry id of the gateway domain.
    pub domain_id: Option<String>,
    /// Labels in name form.
    pub labels: Vec<Tag>,
    /// Registry ids of the labels.
    pub label_ids: Vec<String>,
    /// Hierarchical grouping paths, `/`-delimited (`Default/ops/prod`).
    pub nodes: Vec<String>,
    /// Registry ids of the leaf nodes.
    pub node_ids: Vec<String>,
    /// Provider account or profile the instance came from.
    pub account: Option<String>,
    /// Provider region the instance lives in.
    pub region: Option<String>,
}

impl Default for InstanceAsset {
    fn default() -> Self {
        Self {
            id: None,
            number: None,
            hostname: None,
            protocol: "ssh".to_string(),
            ip: None,
            public_ip: None,
            port: 22,
            platform: "Linux".to_string(),
            comment: None,
            admin_user: None,
            admin_user_id: None,
            domain: None,
            domain_id: None,
            labels: Vec::new(),
            label_ids: Vec::new(),
            nodes: Vec::new(),
            node_ids: Vec::new(),
            account: None,
            region: None,
        }
    }
}

impl InstanceAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes provenance metadata into the comment field, in the order
    /// given, and returns the encoded string.
    pub fn put_comment(&mut self, meta: &[(&str, &str)]) -> String {
        let encoded = meta
            .iter()
            .map(|(k, v)| format!("{}{}{}", k, COMMENT_PAIR_SEP, v))
            .collect::<Vec<_>>()
            .join(&COMMENT_SEP.to_string());
        self.comment = Some(encoded.clone());
        encoded
    }

    /// Decodes provenance metadata from the comment field.
    ///
    /// A malformed pair (no `=`) invalidates the whole comment: a warning is
    /// logged and `None` returned.
    pub fn extract_comment(&self) -> Option<HashMap<String, String>> {
        let comment = self.comment.as_deref()?;
        if comment.is_empty() {
            return None;
        }
        let mut meta = HashMap::new();
        for pair in comment.split(COMMENT_SEP) {
            match pair.split_once(COMMENT_PAIR_SEP) {
                Some((k, v)) => {
                    meta.insert(k.to_string(), v.to_string());
                }
                None => {
                    warn!(comment, asset = %self, "invalid comment structure");
                    return None;
                }
            }
        }
        Some(meta)
    }

    /// The `account` entry of the decoded comment, used to scope registry
    /// assets to the profile that produced them.
    pub fn comment_account(&self) -> Option<String> {
        self.extract_comment()
            .and_then(|meta| meta.get("account").cloned())
    }
}

impl fmt::Display for InstanceAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.hostname.as_deref().unwrap_or("<no hostname>"),
            self.ip.as_deref().unwrap_or("<no ip>")
        )
    }
}

/// Registry id wins when both sides carry one; otherwise the instance number
/// decides. This lets a not-yet-registered asset (number only) compare equal
/// to its registered counterpart.
impl PartialEq for InstanceAsset {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.id.as_deref(), other.id.as_deref()) {
            if a == b {
                return true;
            }
        }
        self.number == other.number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let asset = InstanceAsset::new();
        assert_eq!(asset.protocol, "ssh");
        assert_eq!(asset.port, 22);
        assert_eq!(asset.platform, "Linux");
        assert!(asset.id.is_none());
        assert!(asset.labels.is_empty());
    }

    #[test]
    fn test_equality_by_id() {
        let mut a = InstanceAsset::new();
        a.id = Some("uid-1".to_string());
        a.number = Some("i-111".to_string());
        let mut b = InstanceAsset::new();
        b.id = Some("uid-1".to_string());
        b.number = Some("i-222".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_by_number() {
        let mut a = InstanceAsset::new();
        a.number = Some("i-111".to_string());
        let mut b = InstanceAsset::new();
        b.number = Some("i-111".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_inequality_differing_numbers_without_ids() {
        let mut a = InstanceAsset::new();
        a.number = Some("i-111".to_string());
        let mut b = InstanceAsset::new();
        b.number = Some("i-222".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_number_fallback_on_id_mismatch() {
        let mut a = InstanceAsset::new();
        a.id = Some("uid-1".to_string());
        a.number = Some("i-111".to_string());
        let mut b = InstanceAsset::new();
        b.id = Some("uid-2".to_string());
        b.number = Some("i-111".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_comment_round_trip() {
        let mut asset = InstanceAsset::new();
        let encoded =
            asset.put_comment(&[("provider", "aws"), ("account", "a1"), ("region", "r1")]);
        assert_eq!(encoded, "provider=aws;account=a1;region=r1");

        let meta = asset.extract_comment().unwrap();
        assert_eq!(meta.get("provider").map(String::as_str), Some("aws"));
        assert_eq!(meta.get("account").map(String::as_str), Some("a1"));
        assert_eq!(meta.get("region").map(String::as_str), Some("r1"));
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn test_extract_comment_malformed() {
        let mut asset = InstanceAsset::new();
        asset.comment = Some("provider=aws;garbage".to_string());
        assert!(asset.extract_comment().is_none());
    }

    #[test]
    fn test_extract_comment_absent() {
        let asset = InstanceAsset::new();
        assert!(asset.extract_comment().is_none());
    }

    #[test]
    fn test_comment_account() {
        let mut asset = InstanceAsset::new();
        asset.put_comment(&[("provider", "aws"), ("account", "prod"), ("region", "r1")]);
        assert_eq!(asset.comment_account().as_deref(), Some("prod"));
    }

    #[test]
    fn test_clone_is_independent_and_value_equal() {
        let mut original = InstanceAsset::new();
        original.number = Some("i-111".to_string());
        original.hostname = Some("web-1".to_string());
        original.labels.push(Tag::new("Name", "web-1"));

        let mut copy = original.clone();
        assert_eq!(original, copy);
        assert_eq!(copy.hostname.as_deref(), Some("web-1"));

        copy.hostname = Some("web-2".to_string());
        copy.labels.push(Tag::new("env", "prod"));
        assert_eq!(original.hostname.as_deref(), Some("web-1"));
        assert_eq!(original.labels.len(), 1);
    }
}
