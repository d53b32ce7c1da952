//! Shared connector contracts: the error taxonomy, the assets-provider and
//! task-queue traits, and the compile-time provider profile registry.

use async_trait::async_trait;
use gs_core::selector::SelectorConfig;
use gs_core::InstanceAsset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by registry, cloud, and queue connectors.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Enumerates normalized assets from a cloud inventory.
///
/// Implementations filter to running instances, drop ignored or unselected
/// candidates, and apply the profile's selector pipeline. Every call performs
/// a fresh enumeration; nothing is cached between runs.
#[async_trait]
pub trait AssetsProvider: Send + Sync {
    /// Profile name this provider was built for.
    fn profile(&self) -> &str;

    /// Lists matching assets, optionally restricted to explicit instance ids
    /// and capped at `limit` yielded assets.
    async fn list_assets(
        &self,
        instance_ids: Option<&[String]>,
        limit: Option<usize>,
    ) -> ConnectorResult<Vec<InstanceAsset>>;
}

/// Source of inbound reconciliation requests.
///
/// Delivery is at-least-once: a request is acknowledged with [`finish`] only
/// after it was processed successfully, and released with [`fail`] otherwise
/// so the queue redelivers it.
///
/// [`finish`]: TaskQueue::finish
/// [`fail`]: TaskQueue::fail
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Pulls the currently available requests; may return an empty batch.
    async fn poll(&self) -> ConnectorResult<Vec<SyncRequest>>;

    /// Acknowledges a processed request.
    async fn finish(&self, request: &SyncRequest) -> ConnectorResult<()>;

    /// Releases a failed request for redelivery.
    async fn fail(&self, request: &SyncRequest) -> ConnectorResult<()>;
}

/// An inbound reconciliation request pulled from the task queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Profile to reconcile.
    pub profile: String,

    /// Explicit instance ids; empty means the whole profile.
    #[serde(default)]
    pub instances: Vec<String>,

    /// Queue receipt used for acknowledgment. Not part of the message body.
    #[serde(skip)]
    pub receipt: String,
}

/// Provider profile configuration.
///
/// The provider set is closed at compile time; the `type` field in config
/// selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileConfig {
    Aws(AwsProfileConfig),
}

/// Settings for an AWS EC2 profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsProfileConfig {
    /// Region whose instances are enumerated.
    pub region: String,

    /// Selectors deciding which instances become assets and how they are
    /// enriched. Evaluated in order; an instance is yielded once per
    /// selector that accepts it.
    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,

    /// Stop after this many yielded assets.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_config_from_yaml() {
        let yaml = r#"
type: aws
region: us-east-1
selectors:
  - tags:
      env: "prod.*"
    attrs:
      platform: Linux
"#;
        let profile: ProfileConfig = serde_yaml::from_str(yaml).unwrap();
        let ProfileConfig::Aws(config) = profile;
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.selectors.len(), 1);
        assert!(config.limit.is_none());
    }

    #[test]
    fn test_profile_config_rejects_unknown_type() {
        let yaml = "type: azure\nregion: westeurope\n";
        assert!(serde_yaml::from_str::<ProfileConfig>(yaml).is_err());
    }

    #[test]
    fn test_sync_request_ignores_receipt_in_body() {
        let body = r#"{"profile": "prod", "instances": ["i-1", "i-2"], "receipt": "spoofed"}"#;
        let request: SyncRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.profile, "prod");
        assert_eq!(request.instances, vec!["i-1", "i-2"]);
        assert!(request.receipt.is_empty());
    }

    #[test]
    fn test_sync_request_instances_default_empty() {
        let body = r#"{"profile": "prod"}"#;
        let request: SyncRequest = serde_json::from_str(body).unwrap();
        assert!(request.instances.is_empty());
    }
}
