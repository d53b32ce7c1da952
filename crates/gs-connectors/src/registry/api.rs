//! The logical registry API.

use super::resources::{
    AdminUserRecord, AssetPayload, AssetRecord, DomainRecord, LabelRecord, NodeRecord,
    SystemUserRecord,
};
use crate::traits::ConnectorResult;
use async_trait::async_trait;

/// Operations against the access-management registry.
///
/// Asset CRUD and search, read-only listings of the relational resource
/// kinds, asynchronous action triggers, and task log fetch. Implemented over
/// HTTP by [`RegistryClient`](super::RegistryClient) and in memory by
/// [`MockRegistry`](super::MockRegistry) for tests.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn list_assets(&self) -> ConnectorResult<Vec<AssetRecord>>;

    /// Lists assets whose hostname matches exactly.
    async fn find_assets(&self, hostname: &str) -> ConnectorResult<Vec<AssetRecord>>;

    /// Fetches one asset; `None` when the id is unknown to the registry.
    async fn get_asset(&self, id: &str) -> ConnectorResult<Option<AssetRecord>>;

    async fn create_asset(&self, payload: &AssetPayload) -> ConnectorResult<AssetRecord>;

    async fn update_asset(&self, id: &str, payload: &AssetPayload)
        -> ConnectorResult<AssetRecord>;

    /// Deletes an asset. `Ok(false)` means the asset was already gone.
    async fn delete_asset(&self, id: &str) -> ConnectorResult<bool>;

    async fn list_admin_users(&self) -> ConnectorResult<Vec<AdminUserRecord>>;

    async fn list_domains(&self) -> ConnectorResult<Vec<DomainRecord>>;

    async fn list_labels(&self) -> ConnectorResult<Vec<LabelRecord>>;

    async fn list_nodes(&self) -> ConnectorResult<Vec<NodeRecord>>;

    async fn list_system_users(&self) -> ConnectorResult<Vec<SystemUserRecord>>;

    /// Triggers an asynchronous liveness probe. `Ok(None)` means the registry
    /// did not accept the trigger.
    async fn start_alive_check(&self, asset_id: &str) -> ConnectorResult<Option<String>>;

    /// Triggers an asynchronous credential push.
    async fn start_push(&self, user_id: &str, asset_id: &str) -> ConnectorResult<Option<String>>;

    /// Triggers an asynchronous connectivity test for a pushed credential.
    async fn start_connectivity_test(
        &self,
        user_id: &str,
        asset_id: &str,
    ) -> ConnectorResult<Option<String>>;

    /// Fetches the latest captured log snapshot for a task. `Ok(None)` when
    /// no output has been captured yet.
    async fn task_log(&self, task_id: &str) -> ConnectorResult<Option<String>>;
}
