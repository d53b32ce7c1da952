//! Mock assets provider for testing.

use crate::traits::{AssetsProvider, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use gs_core::InstanceAsset;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory provider yielding canned, already-selected assets.
pub struct MockAssetsProvider {
    profile: String,
    assets: Arc<RwLock<Vec<InstanceAsset>>>,
    healthy: Arc<RwLock<bool>>,
    calls: Arc<RwLock<usize>>,
}

impl MockAssetsProvider {
    pub fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            assets: Arc::new(RwLock::new(Vec::new())),
            healthy: Arc::new(RwLock::new(true)),
            calls: Arc::new(RwLock::new(0)),
        }
    }

    /// A provider holding two linked-up candidates with provenance comments
    /// for the given profile.
    pub fn with_sample_data(profile: &str) -> Self {
        let provider = Self::new(profile);
        let assets = vec![
            Self::sample_asset(profile, "i-0aaa111", "web-1", "10.0.0.1"),
            Self::sample_asset(profile, "i-0bbb222", "web-2", "10.0.0.2"),
        ];
        Self {
            assets: Arc::new(RwLock::new(assets)),
            ..provider
        }
    }

    pub fn sample_asset(profile: &str, number: &str, hostname: &str, ip: &str) -> InstanceAsset {
        let mut asset = InstanceAsset::new();
        asset.number = Some(number.to_string());
        asset.hostname = Some(format!("{}-{}", hostname, number));
        asset.ip = Some(ip.to_string());
        asset.account = Some(profile.to_string());
        asset.region = Some("us-east-1".to_string());
        asset.put_comment(&[
            ("provider", "aws"),
            ("account", profile),
            ("region", "us-east-1"),
        ]);
        asset
    }

    pub async fn set_assets(&self, assets: Vec<InstanceAsset>) {
        *self.assets.write().await = assets;
    }

    pub async fn add_asset(&self, asset: InstanceAsset) {
        self.assets.write().await.push(asset);
    }

    pub async fn remove_asset(&self, number: &str) {
        self.assets
            .write()
            .await
            .retain(|a| a.number.as_deref() != Some(number));
    }

    pub async fn set_healthy(&self, healthy: bool) {
        *self.healthy.write().await = healthy;
    }

    pub async fn call_count(&self) -> usize {
        *self.calls.read().await
    }
}

#[async_trait]
impl AssetsProvider for MockAssetsProvider {
    fn profile(&self) -> &str {
        &self.profile
    }

    async fn list_assets(
        &self,
        instance_ids: Option<&[String]>,
        limit: Option<usize>,
    ) -> ConnectorResult<Vec<InstanceAsset>> {
        *self.calls.write().await += 1;

        if !*self.healthy.read().await {
            return Err(ConnectorError::Provider(
                "mock provider is unhealthy".to_string(),
            ));
        }

        let assets = self.assets.read().await;
        let mut matched: Vec<InstanceAsset> = assets
            .iter()
            .filter(|asset| match instance_ids {
                Some(ids) => asset
                    .number
                    .as_ref()
                    .map_or(false, |number| ids.contains(number)),
                None => true,
            })
            .cloned()
            .collect();

        if let Some(max) = limit {
            matched.truncate(max);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_assets_filters_and_limits() {
        let provider = MockAssetsProvider::with_sample_data("prod");

        let all = provider.list_assets(None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let one = provider
            .list_assets(Some(&["i-0aaa111".to_string()]), None)
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].number.as_deref(), Some("i-0aaa111"));

        let limited = provider.list_assets(None, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert_eq!(provider.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_unhealthy_provider_errors() {
        let provider = MockAssetsProvider::with_sample_data("prod");
        provider.set_healthy(false).await;
        assert!(provider.list_assets(None, None).await.is_err());
    }

    #[test]
    fn test_sample_assets_carry_provenance() {
        let asset = MockAssetsProvider::sample_asset("prod", "i-1", "web", "10.0.0.1");
        assert_eq!(asset.comment_account().as_deref(), Some("prod"));
        assert_eq!(asset.hostname.as_deref(), Some("web-i-1"));
    }
}
