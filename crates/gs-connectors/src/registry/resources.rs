//! Typed registry resource records and the outbound asset payload.
//!
//! The registry returns relational fields in id form; records convert into
//! [`InstanceAsset`] with those ids on the id side, leaving the name side for
//! the linking step to fill in.

use gs_core::InstanceAsset;
use serde::{Deserialize, Serialize};

pub(crate) const ASSETS_PATH: &str = "api/assets/v1/assets";
pub(crate) const ADMIN_USERS_PATH: &str = "api/assets/v1/admin-user";
pub(crate) const DOMAINS_PATH: &str = "api/assets/v1/domain";
pub(crate) const LABELS_PATH: &str = "api/assets/v1/labels";
pub(crate) const NODES_PATH: &str = "api/assets/v1/nodes";
pub(crate) const SYSTEM_USERS_PATH: &str = "api/assets/v1/system-user";
pub(crate) const TASKS_PATH: &str = "api/ops/v1/celery/task";

/// A registry asset as returned by the assets endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Admin credential id.
    #[serde(default)]
    pub admin_user: Option<String>,
    /// Gateway domain id.
    #[serde(default)]
    pub domain: Option<String>,
    /// Label ids.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Leaf node ids.
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl AssetRecord {
    /// Converts the record into a normalized asset. Relational ids land on
    /// the id-form fields and stay unresolved until linking.
    pub fn into_asset(self) -> InstanceAsset {
        let mut asset = InstanceAsset::new();
        asset.id = Some(self.id);
        asset.number = self.number;
        asset.hostname = self.hostname;
        if let Some(protocol) = self.protocol {
            asset.protocol = protocol;
        }
        asset.ip = self.ip;
        asset.public_ip = self.public_ip;
        if let Some(port) = self.port {
            asset.port = port;
        }
        if let Some(platform) = self.platform {
            asset.platform = platform;
        }
        asset.comment = self.comment;
        asset.admin_user_id = self.admin_user;
        asset.domain_id = self.domain;
        asset.label_ids = self.labels;
        asset.node_ids = self.nodes;
        asset
    }
}

/// An admin credential known to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserRecord {
    pub id: String,
    pub name: String,
}

/// A gateway domain known to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: String,
    pub name: String,
}

/// A label known to the registry. `name` is the label key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    pub id: String,
    pub name: String,
    pub value: String,
}

/// One node of the registry's organizational tree, in its flat listing form.
///
/// `key` encodes the position as `:`-joined ordinals (`"1:2:3"` is three
/// levels deep) and `value` is the node's own path segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub key: String,
    pub value: String,
}

/// A login credential that can be pushed to assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemUserRecord {
    pub id: String,
    pub name: String,
}

/// Outbound asset payload. Relational values are ids, serialized under the
/// registry's own field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    pub port: u16,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nodes: Vec<String>,
}

impl AssetPayload {
    /// Projects a linked asset into its registry payload.
    pub fn from_asset(asset: &InstanceAsset) -> Self {
        Self {
            number: asset.number.clone(),
            hostname: asset.hostname.clone(),
            protocol: asset.protocol.clone(),
            ip: asset.ip.clone(),
            public_ip: asset.public_ip.clone(),
            port: asset.port,
            platform: asset.platform.clone(),
            comment: asset.comment.clone(),
            admin_user: asset.admin_user_id.clone(),
            domain: asset.domain_id.clone(),
            labels: asset.label_ids.clone(),
            nodes: asset.node_ids.clone(),
        }
    }
}
