//! Integration tests for queue-driven reconciliation.
//!
//! These tests drive [`ListenLoop`] against the in-memory queue, registry,
//! and provider mocks, covering:
//! - Acknowledgment only after a request's run succeeds
//! - Failed runs leaving the request released for redelivery
//! - Requests restricted to explicit instances
//! - Unknown profiles failing without touching the registry
//!
//! # Running these tests
//!
//! ```bash
//! cargo test --package gs-engine --test listen_integration_tests
//! ```

use gs_connectors::{
    AssetsProvider, MockAssetsProvider, MockRegistry, MockTaskQueue, RegistryApi,
};
use gs_engine::{ListenLoop, SyncOptions};
use std::collections::BTreeMap;
use std::sync::Arc;

fn providers_with(
    profile: &str,
    provider: MockAssetsProvider,
) -> BTreeMap<String, Box<dyn AssetsProvider>> {
    let mut providers: BTreeMap<String, Box<dyn AssetsProvider>> = BTreeMap::new();
    providers.insert(profile.to_string(), Box::new(provider));
    providers
}

#[tokio::test]
async fn test_successful_request_is_acknowledged() {
    let queue = MockTaskQueue::new();
    queue.push("prod", &[], "r-1").await;

    let registry = Arc::new(MockRegistry::with_sample_data());
    let api: Arc<dyn RegistryApi> = Arc::clone(&registry) as Arc<dyn RegistryApi>;
    let providers = providers_with("prod", MockAssetsProvider::with_sample_data("prod"));

    let listener = ListenLoop::new(&queue, api, &providers, SyncOptions::default());
    let handled = listener.run_once().await.unwrap();

    assert_eq!(handled, 1);
    assert_eq!(queue.finished_receipts().await, vec!["r-1"]);
    assert!(queue.failed_receipts().await.is_empty());
    assert_eq!(registry.assets().await.len(), 2);
}

#[tokio::test]
async fn test_failed_run_is_released_for_redelivery() {
    let queue = MockTaskQueue::new();
    queue.push("prod", &[], "r-1").await;

    let registry = Arc::new(MockRegistry::with_sample_data());
    let api: Arc<dyn RegistryApi> = Arc::clone(&registry) as Arc<dyn RegistryApi>;

    let provider = MockAssetsProvider::with_sample_data("prod");
    provider.set_healthy(false).await;
    let providers = providers_with("prod", provider);

    let listener = ListenLoop::new(&queue, api, &providers, SyncOptions::default());
    let handled = listener.run_once().await.unwrap();

    assert_eq!(handled, 1);
    assert!(queue.finished_receipts().await.is_empty());
    assert_eq!(queue.failed_receipts().await, vec!["r-1"]);
    assert!(registry.assets().await.is_empty());
}

#[tokio::test]
async fn test_request_restricts_to_named_instances() {
    let queue = MockTaskQueue::new();
    queue.push("prod", &["i-0bbb222"], "r-1").await;

    let registry = Arc::new(MockRegistry::with_sample_data());
    let api: Arc<dyn RegistryApi> = Arc::clone(&registry) as Arc<dyn RegistryApi>;
    let providers = providers_with("prod", MockAssetsProvider::with_sample_data("prod"));

    let listener = ListenLoop::new(&queue, api, &providers, SyncOptions::default());
    listener.run_once().await.unwrap();

    assert_eq!(queue.finished_receipts().await, vec!["r-1"]);
    assert!(registry.asset_by_number("i-0aaa111").await.is_none());
    assert!(registry.asset_by_number("i-0bbb222").await.is_some());
}

#[tokio::test]
async fn test_unknown_profile_never_touches_the_registry() {
    let queue = MockTaskQueue::new();
    queue.push("staging", &[], "r-1").await;
    queue.push("prod", &[], "r-2").await;

    let registry = Arc::new(MockRegistry::with_sample_data());
    let api: Arc<dyn RegistryApi> = Arc::clone(&registry) as Arc<dyn RegistryApi>;
    let providers = providers_with("prod", MockAssetsProvider::with_sample_data("prod"));

    let listener = ListenLoop::new(&queue, api, &providers, SyncOptions::default());
    let handled = listener.run_once().await.unwrap();

    // The bad request fails, the good one in the same batch still lands
    assert_eq!(handled, 2);
    assert_eq!(queue.failed_receipts().await, vec!["r-1"]);
    assert_eq!(queue.finished_receipts().await, vec!["r-2"]);
    assert_eq!(registry.assets().await.len(), 2);
}
