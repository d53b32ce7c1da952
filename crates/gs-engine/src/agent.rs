//! The linking agent.
//!
//! Provider-side assets carry relational references in name form (admin
//! credential names, label pairs, node paths); the registry wants ids.
//! The agent resolves the two forms against the catalog, decides between
//! create and update, and fronts the credential push and liveness flows.
//!
//! Resolution misses degrade: the offending reference is dropped with a
//! warning and the remainder of the asset still syncs.

use gs_connectors::registry::{AssetPayload, AssetRecord, ConfirmOptions, TaskMonitor};
use gs_connectors::{Catalog, ConnectorResult, RegistryApi};
use gs_core::InstanceAsset;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Whether a sync created the registry asset or updated it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDisposition {
    Created,
    Updated,
}

/// A synced asset together with what the sync did.
#[derive(Debug, Clone)]
pub struct SyncedAsset {
    pub asset: InstanceAsset,
    pub disposition: SyncDisposition,
}

pub struct AssetAgent {
    api: Arc<dyn RegistryApi>,
    catalog: Catalog,
    monitor: TaskMonitor,
}

impl AssetAgent {
    /// Builds an agent with a fresh catalog. Workflows create one agent per
    /// run so catalog staleness is bounded by the run.
    pub fn new(api: Arc<dyn RegistryApi>) -> Self {
        let catalog = Catalog::new(Arc::clone(&api));
        let monitor = TaskMonitor::new(Arc::clone(&api));
        Self {
            api,
            catalog,
            monitor,
        }
    }

    /// True when every relational pair carries both forms or neither.
    ///
    /// A non-empty name form without its id form (or the reverse) means the
    /// asset still needs linking before it can round-trip the registry.
    pub fn is_linked(asset: &InstanceAsset) -> bool {
        let pairs = [
            (asset.admin_user.is_some(), asset.admin_user_id.is_some()),
            (asset.domain.is_some(), asset.domain_id.is_some()),
            (!asset.labels.is_empty(), !asset.label_ids.is_empty()),
            (!asset.nodes.is_empty(), !asset.node_ids.is_empty()),
        ];
        pairs.iter().all(|(name_form, id_form)| name_form == id_form)
    }

    /// Resolves the missing side of every relational pair.
    ///
    /// References the registry does not know are dropped with a warning;
    /// linking never fails the asset outright.
    #[instrument(skip(self, asset), fields(asset = %asset))]
    pub async fn link(&self, mut asset: InstanceAsset) -> InstanceAsset {
        if let (Some(name), None) = (&asset.admin_user, &asset.admin_user_id) {
            match self.catalog.get_admin_user_id(name).await {
                Some(id) => asset.admin_user_id = Some(id),
                None => warn!(admin_user = %name, "admin user not found in the registry"),
            }
        } else if let (None, Some(id)) = (&asset.admin_user, &asset.admin_user_id) {
            match self.catalog.get_admin_user_name(id).await {
                Some(name) => asset.admin_user = Some(name),
                None => warn!(admin_user_id = %id, "admin user id not found in the registry"),
            }
        }

        if let (Some(name), None) = (&asset.domain, &asset.domain_id) {
            match self.catalog.get_domain_id(name).await {
                Some(id) => asset.domain_id = Some(id),
                None => warn!(domain = %name, "domain not found in the registry"),
            }
        } else if let (None, Some(id)) = (&asset.domain, &asset.domain_id) {
            match self.catalog.get_domain_name(id).await {
                Some(name) => asset.domain = Some(name),
                None => warn!(domain_id = %id, "domain id not found in the registry"),
            }
        }

        if !asset.labels.is_empty() && asset.label_ids.is_empty() {
            let mut ids = Vec::new();
            for label in &asset.labels {
                match self.catalog.get_label_id(label).await {
                    Some(id) => ids.push(id),
                    None => warn!(label = %label, "label not found in the registry, dropping"),
                }
            }
            asset.label_ids = ids;
        } else if asset.labels.is_empty() && !asset.label_ids.is_empty() {
            let mut labels = Vec::new();
            for id in &asset.label_ids {
                match self.catalog.get_label(id).await {
                    Some(label) => labels.push(label),
                    None => warn!(label_id = %id, "label id not found in the registry, dropping"),
                }
            }
            asset.labels = labels;
        }

        if !asset.nodes.is_empty() && asset.node_ids.is_empty() {
            let mut ids = Vec::new();
            for path in &asset.nodes {
                match self.catalog.get_node_id(path).await {
                    Some(id) => ids.push(id),
                    None => warn!(node = %path, "node path not found in the registry, dropping"),
                }
            }
            asset.node_ids = ids;
        } else if asset.nodes.is_empty() && !asset.node_ids.is_empty() {
            let mut paths = Vec::new();
            for id in &asset.node_ids {
                match self.catalog.get_node_path(id).await {
                    Some(path) => paths.push(path),
                    None => warn!(node_id = %id, "node id not found in the registry, dropping"),
                }
            }
            asset.nodes = paths;
        }

        asset
    }

    /// Syncs one asset into the registry: link if needed, then update the
    /// existing record or create a new one.
    ///
    /// An existing record is found by the asset's known registry id, or
    /// failing that by exact hostname. A known id the registry no longer has
    /// falls through to create.
    #[instrument(skip(self, asset), fields(asset = %asset))]
    pub async fn sync(&self, asset: InstanceAsset) -> ConnectorResult<SyncedAsset> {
        let asset = if Self::is_linked(&asset) {
            asset
        } else {
            self.link(asset).await
        };

        let payload = AssetPayload::from_asset(&asset);
        match self.resolve_registry_id(&asset).await? {
            Some(id) => {
                let record = self.api.update_asset(&id, &payload).await?;
                info!(asset = %asset, id = %record.id, "updated registry asset");
                Ok(SyncedAsset {
                    asset: record.into_asset(),
                    disposition: SyncDisposition::Updated,
                })
            }
            None => {
                let record = self.api.create_asset(&payload).await?;
                info!(asset = %asset, id = %record.id, "created registry asset");
                Ok(SyncedAsset {
                    asset: record.into_asset(),
                    disposition: SyncDisposition::Created,
                })
            }
        }
    }

    async fn resolve_registry_id(&self, asset: &InstanceAsset) -> ConnectorResult<Option<String>> {
        if let Some(id) = &asset.id {
            return match self.api.get_asset(id).await? {
                Some(record) => Ok(Some(record.id)),
                None => {
                    debug!(id = %id, "known registry id is gone, will create");
                    Ok(None)
                }
            };
        }

        let hostname = match asset.hostname.as_deref() {
            Some(hostname) if !hostname.is_empty() => hostname,
            _ => return Ok(None),
        };
        let matches = self.api.find_assets(hostname).await?;
        Ok(matches.into_iter().next().map(|record| record.id))
    }

    /// Lists the registry's assets in normalized form.
    pub async fn registry_assets(&self) -> ConnectorResult<Vec<InstanceAsset>> {
        Ok(self
            .api
            .list_assets()
            .await?
            .into_iter()
            .map(AssetRecord::into_asset)
            .collect())
    }

    /// Deletes a registry asset. `Ok(false)` means it was already gone.
    pub async fn delete(&self, asset_id: &str) -> ConnectorResult<bool> {
        self.api.delete_asset(asset_id).await
    }

    /// Runs a confirmed liveness probe against a registry asset.
    pub async fn check_alive(&self, asset_id: &str, opts: &ConfirmOptions) -> bool {
        self.monitor.check_alive(asset_id, opts).await
    }

    /// Resolves a comma-separated system-user list to registry ids, or every
    /// system user when no list is given. Unknown names are skipped with a
    /// warning.
    async fn resolve_system_users(&self, users: Option<&str>) -> Vec<String> {
        match users {
            Some(list) => {
                let mut ids = Vec::new();
                for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    match self.catalog.get_system_user_id(name).await {
                        Some(id) => ids.push(id),
                        None => warn!(user = name, "system user not found, skipping"),
                    }
                }
                ids
            }
            None => self
                .catalog
                .system_users()
                .await
                .iter()
                .map(|user| user.id.clone())
                .collect(),
        }
    }

    /// Triggers credential pushes for the given system users against an
    /// asset, without waiting for confirmation. Returns the task ids of the
    /// pushes the registry queued.
    #[instrument(skip(self))]
    pub async fn push_system_users(&self, asset_id: &str, users: Option<&str>) -> Vec<String> {
        let mut task_ids = Vec::new();
        for user_id in self.resolve_system_users(users).await {
            match self.api.start_push(&user_id, asset_id).await {
                Ok(Some(task_id)) => {
                    debug!(user_id = %user_id, asset_id, task_id = %task_id, "push triggered");
                    task_ids.push(task_id);
                }
                Ok(None) => warn!(user_id = %user_id, asset_id, "push was not accepted"),
                Err(e) => warn!(user_id = %user_id, asset_id, error = %e, "failed to trigger push"),
            }
        }
        task_ids
    }

    /// Pushes and verifies the given system users against an asset. True
    /// only when every credential ends up verified.
    #[instrument(skip(self, opts))]
    pub async fn push_check_system_users(
        &self,
        asset_id: &str,
        users: Option<&str>,
        opts: &ConfirmOptions,
        max_tries: u32,
        force_push: bool,
    ) -> bool {
        let mut all_verified = true;
        for user_id in self.resolve_system_users(users).await {
            let name = self
                .catalog
                .get_system_user_name(&user_id)
                .await
                .unwrap_or_else(|| user_id.clone());

            if self
                .monitor
                .push_checked(&user_id, asset_id, opts, max_tries, force_push)
                .await
            {
                info!(user = %name, asset_id, "credential verified");
            } else {
                error!(user = %name, asset_id, "credential could not be verified");
                all_verified = false;
            }
        }
        all_verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_connectors::registry::MockRegistry;
    use gs_core::Tag;

    fn agent_over(registry: &Arc<MockRegistry>) -> AssetAgent {
        AssetAgent::new(Arc::clone(registry) as Arc<dyn RegistryApi>)
    }

    fn name_form_asset() -> InstanceAsset {
        let mut asset = InstanceAsset::new();
        asset.number = Some("i-0abc".to_string());
        asset.hostname = Some("web-i-0abc".to_string());
        asset.ip = Some("10.0.0.1".to_string());
        asset.admin_user = Some("admin".to_string());
        asset.domain = Some("gw-default".to_string());
        asset.labels = vec![Tag::new("env", "prod")];
        asset.nodes = vec!["Default/ops/prod".to_string()];
        asset
    }

    #[test]
    fn test_is_linked() {
        let mut asset = InstanceAsset::new();
        assert!(AssetAgent::is_linked(&asset));

        asset.admin_user = Some("admin".to_string());
        assert!(!AssetAgent::is_linked(&asset));

        asset.admin_user_id = Some("au-1".to_string());
        assert!(AssetAgent::is_linked(&asset));

        asset.label_ids = vec!["l-1".to_string()];
        assert!(!AssetAgent::is_linked(&asset));

        asset.labels = vec![Tag::new("env", "prod")];
        assert!(AssetAgent::is_linked(&asset));
    }

    #[tokio::test]
    async fn test_link_resolves_names_to_ids() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let linked = agent.link(name_form_asset()).await;

        assert_eq!(linked.admin_user_id.as_deref(), Some("au-1"));
        assert_eq!(linked.domain_id.as_deref(), Some("d-1"));
        assert_eq!(linked.label_ids, vec!["l-1"]);
        assert_eq!(linked.node_ids, vec!["n-3"]);
        assert!(AssetAgent::is_linked(&linked));
    }

    #[tokio::test]
    async fn test_link_resolves_ids_to_names() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let mut asset = InstanceAsset::new();
        asset.admin_user_id = Some("au-1".to_string());
        asset.label_ids = vec!["l-1".to_string()];
        asset.node_ids = vec!["n-3".to_string()];

        let linked = agent.link(asset).await;
        assert_eq!(linked.admin_user.as_deref(), Some("admin"));
        assert_eq!(linked.labels, vec![Tag::new("env", "prod")]);
        assert_eq!(linked.nodes, vec!["Default/ops/prod"]);
    }

    #[tokio::test]
    async fn test_link_drops_unknown_references() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let mut asset = name_form_asset();
        asset.labels.push(Tag::new("env", "qa"));
        asset.nodes.push("Default/missing".to_string());
        asset.admin_user = Some("nobody".to_string());

        let linked = agent.link(asset).await;
        assert_eq!(linked.label_ids, vec!["l-1"]);
        assert_eq!(linked.node_ids, vec!["n-3"]);
        assert!(linked.admin_user_id.is_none());
    }

    #[tokio::test]
    async fn test_sync_creates_then_updates_by_hostname() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let synced = agent.sync(name_form_asset()).await.unwrap();
        assert_eq!(synced.disposition, SyncDisposition::Created);
        let created_id = synced.asset.id.clone().unwrap();

        // Same hostname, no known id: resolves to the existing record
        let synced_again = agent.sync(name_form_asset()).await.unwrap();
        assert_eq!(synced_again.disposition, SyncDisposition::Updated);
        assert_eq!(synced_again.asset.id.as_deref(), Some(created_id.as_str()));

        let counters = registry.counters().await;
        assert_eq!(counters.creates, 1);
        assert_eq!(counters.updates, 1);
    }

    #[tokio::test]
    async fn test_sync_with_dangling_id_creates() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let mut asset = name_form_asset();
        asset.id = Some("asset-gone".to_string());

        let synced = agent.sync(asset).await.unwrap();
        assert_eq!(synced.disposition, SyncDisposition::Created);
        assert_ne!(synced.asset.id.as_deref(), Some("asset-gone"));
    }

    #[tokio::test]
    async fn test_sync_returns_record_with_id_forms() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let synced = agent.sync(name_form_asset()).await.unwrap();
        assert_eq!(synced.asset.admin_user_id.as_deref(), Some("au-1"));
        assert_eq!(synced.asset.label_ids, vec!["l-1"]);
        assert_eq!(synced.asset.number.as_deref(), Some("i-0abc"));
    }

    #[tokio::test]
    async fn test_registry_assets_normalized() {
        let registry = Arc::new(MockRegistry::new());
        registry
            .add_asset(AssetRecord {
                id: "a-1".to_string(),
                number: Some("i-1".to_string()),
                hostname: Some("web".to_string()),
                protocol: None,
                ip: None,
                public_ip: None,
                port: None,
                platform: None,
                comment: Some("provider=aws;account=prod;region=us-east-1".to_string()),
                admin_user: None,
                domain: None,
                labels: Vec::new(),
                nodes: Vec::new(),
            })
            .await;

        let agent = agent_over(&registry);
        let assets = agent.registry_assets().await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id.as_deref(), Some("a-1"));
        assert_eq!(assets[0].comment_account().as_deref(), Some("prod"));
    }

    #[tokio::test]
    async fn test_push_system_users_by_name() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let task_ids = agent
            .push_system_users("a-1", Some("ops_user, missing_user"))
            .await;
        assert_eq!(task_ids.len(), 1);
        assert_eq!(registry.counters().await.pushes, 1);
    }

    #[tokio::test]
    async fn test_push_system_users_all() {
        let registry = Arc::new(MockRegistry::with_sample_data());
        let agent = agent_over(&registry);

        let task_ids = agent.push_system_users("a-1", None).await;
        assert_eq!(task_ids.len(), 2);
    }
}
