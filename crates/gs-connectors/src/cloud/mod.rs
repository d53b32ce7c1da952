//! Cloud inventory providers.
//!
//! A provider enumerates a profile's instances, normalizes them into
//! [`InstanceAsset`](gs_core::InstanceAsset) candidates, and runs the
//! profile's selector pipeline. The provider set is closed at compile time
//! and dispatched from [`ProfileConfig`].

pub mod aws;
pub mod mock;

pub use aws::AwsAssetsProvider;
pub use mock::MockAssetsProvider;

use crate::traits::{AssetsProvider, ConnectorResult, ProfileConfig};

/// Builds the provider for a named profile.
pub async fn create_provider(
    name: &str,
    profile: &ProfileConfig,
) -> ConnectorResult<Box<dyn AssetsProvider>> {
    match profile {
        ProfileConfig::Aws(config) => {
            let provider = AwsAssetsProvider::new(name, config.clone()).await?;
            Ok(Box::new(provider))
        }
    }
}
