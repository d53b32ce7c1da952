//! Mock registry for testing.
//!
//! Stores every resource kind in memory and scripts the asynchronous task
//! machinery: triggers hand out task ids whose logs are staged according to
//! the mock's alive/connective state, so confirmation flows run against it
//! without a registry.

use super::api::RegistryApi;
use super::resources::{
    AdminUserRecord, AssetPayload, AssetRecord, DomainRecord, LabelRecord, NodeRecord,
    SystemUserRecord,
};
use crate::traits::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-operation call counts, for asserting on caching and retry behavior.
#[derive(Debug, Clone, Default)]
pub struct CallCounters {
    pub list_assets: usize,
    pub list_admin_users: usize,
    pub list_domains: usize,
    pub list_labels: usize,
    pub list_nodes: usize,
    pub list_system_users: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub alive_checks: usize,
    pub pushes: usize,
    pub connectivity_tests: usize,
    pub log_fetches: usize,
}

pub struct MockRegistry {
    assets: Arc<RwLock<Vec<AssetRecord>>>,
    admin_users: Arc<RwLock<Vec<AdminUserRecord>>>,
    domains: Arc<RwLock<Vec<DomainRecord>>>,
    labels: Arc<RwLock<Vec<LabelRecord>>>,
    nodes: Arc<RwLock<Vec<NodeRecord>>>,
    system_users: Arc<RwLock<Vec<SystemUserRecord>>>,
    /// Task logs keyed by task id.
    task_logs: Arc<RwLock<HashMap<String, String>>>,
    /// Assets whose liveness probe passes.
    alive: Arc<RwLock<HashSet<String>>>,
    /// (user id, asset id) pairs whose connectivity test passes.
    connective: Arc<RwLock<HashSet<(String, String)>>>,
    /// When set, a push makes its (user, asset) pair connective.
    push_establishes: Arc<RwLock<bool>>,
    /// When set, triggers succeed but hand out no task id.
    triggers_refused: Arc<RwLock<bool>>,
    /// Asset ids whose delete call is refused.
    failing_deletes: Arc<RwLock<HashSet<String>>>,
    healthy: Arc<RwLock<bool>>,
    counters: Arc<RwLock<CallCounters>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(RwLock::new(Vec::new())),
            admin_users: Arc::new(RwLock::new(Vec::new())),
            domains: Arc::new(RwLock::new(Vec::new())),
            labels: Arc::new(RwLock::new(Vec::new())),
            nodes: Arc::new(RwLock::new(Vec::new())),
            system_users: Arc::new(RwLock::new(Vec::new())),
            task_logs: Arc::new(RwLock::new(HashMap::new())),
            alive: Arc::new(RwLock::new(HashSet::new())),
            connective: Arc::new(RwLock::new(HashSet::new())),
            push_establishes: Arc::new(RwLock::new(false)),
            triggers_refused: Arc::new(RwLock::new(false)),
            failing_deletes: Arc::new(RwLock::new(HashSet::new())),
            healthy: Arc::new(RwLock::new(true)),
            counters: Arc::new(RwLock::new(CallCounters::default())),
        }
    }

    /// A registry pre-populated with one resource of each relational kind
    /// and a three-level node tree.
    pub fn with_sample_data() -> Self {
        let mock = Self::new();

        let admin_users = vec![AdminUserRecord {
            id: "au-1".to_string(),
            name: "admin".to_string(),
        }];
        let domains = vec![DomainRecord {
            id: "d-1".to_string(),
            name: "gw-default".to_string(),
        }];
        let labels = vec![
            LabelRecord {
                id: "l-1".to_string(),
                name: "env".to_string(),
                value: "prod".to_string(),
            },
            LabelRecord {
                id: "l-2".to_string(),
                name: "team".to_string(),
                value: "web".to_string(),
            },
        ];
        let nodes = vec![
            NodeRecord {
                id: "n-1".to_string(),
                key: "1".to_string(),
                value: "Default".to_string(),
            },
            NodeRecord {
                id: "n-2".to_string(),
                key: "1:2".to_string(),
                value: "ops".to_string(),
            },
            NodeRecord {
                id: "n-3".to_string(),
                key: "1:2:3".to_string(),
                value: "prod".to_string(),
            },
        ];
        let system_users = vec![
            SystemUserRecord {
                id: "su-1".to_string(),
                name: "ops_user".to_string(),
            },
            SystemUserRecord {
                id: "su-2".to_string(),
                name: "deploy".to_string(),
            },
        ];

        Self {
            admin_users: Arc::new(RwLock::new(admin_users)),
            domains: Arc::new(RwLock::new(domains)),
            labels: Arc::new(RwLock::new(labels)),
            nodes: Arc::new(RwLock::new(nodes)),
            system_users: Arc::new(RwLock::new(system_users)),
            ..mock
        }
    }

    pub async fn add_asset(&self, record: AssetRecord) {
        self.assets.write().await.push(record);
    }

    pub async fn add_admin_user(&self, record: AdminUserRecord) {
        self.admin_users.write().await.push(record);
    }

    pub async fn add_system_user(&self, record: SystemUserRecord) {
        self.system_users.write().await.push(record);
    }

    pub async fn asset_by_number(&self, number: &str) -> Option<AssetRecord> {
        self.assets
            .read()
            .await
            .iter()
            .find(|a| a.number.as_deref() == Some(number))
            .cloned()
    }

    pub async fn assets(&self) -> Vec<AssetRecord> {
        self.assets.read().await.clone()
    }

    /// Stages a raw task log under an explicit task id.
    pub async fn set_task_log(&self, task_id: &str, log: String) {
        self.task_logs.write().await.insert(task_id.to_string(), log);
    }

    /// Marks an asset as passing its liveness probe.
    pub async fn set_alive(&self, asset_id: &str) {
        self.alive.write().await.insert(asset_id.to_string());
    }

    /// Marks a (user, asset) pair as passing its connectivity test.
    pub async fn set_connective(&self, user_id: &str, asset_id: &str) {
        self.connective
            .write()
            .await
            .insert((user_id.to_string(), asset_id.to_string()));
    }

    /// When enabled, a push makes its (user, asset) pair connective.
    pub async fn set_push_establishes(&self, enabled: bool) {
        *self.push_establishes.write().await = enabled;
    }

    /// When enabled, triggers succeed but hand out no task id.
    pub async fn set_refuse_triggers(&self, enabled: bool) {
        *self.triggers_refused.write().await = enabled;
    }

    /// Makes delete calls for this asset id fail.
    pub async fn fail_deletes(&self, asset_id: &str) {
        self.failing_deletes
            .write()
            .await
            .insert(asset_id.to_string());
    }

    pub async fn set_healthy(&self, healthy: bool) {
        *self.healthy.write().await = healthy;
    }

    pub async fn counters(&self) -> CallCounters {
        self.counters.read().await.clone()
    }

    async fn ensure_healthy(&self) -> ConnectorResult<()> {
        if *self.healthy.read().await {
            Ok(())
        } else {
            Err(ConnectorError::ConnectionFailed(
                "mock registry is unhealthy".to_string(),
            ))
        }
    }

    /// Registers a task whose log is already in its terminal state.
    async fn stage_task(&self, prefix: &str, log: String) -> String {
        let task_id = format!("{}-{}", prefix, Uuid::new_v4());
        self.task_logs.write().await.insert(task_id.clone(), log);
        task_id
    }

    fn passed_log(target: &str) -> String {
        format!(
            "PLAY [probe]\nTASK [ping] \r\nok: [{}]\n\nTask finished",
            target
        )
    }

    fn failed_log(target: &str) -> String {
        format!(
            "PLAY [probe]\nTASK [ping] \r\nfatal: [{}]: UNREACHABLE\n\nTask finished",
            target
        )
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryApi for MockRegistry {
    async fn list_assets(&self) -> ConnectorResult<Vec<AssetRecord>> {
        self.counters.write().await.list_assets += 1;
        self.ensure_healthy().await?;
        Ok(self.assets.read().await.clone())
    }

    async fn find_assets(&self, hostname: &str) -> ConnectorResult<Vec<AssetRecord>> {
        self.ensure_healthy().await?;
        Ok(self
            .assets
            .read()
            .await
            .iter()
            .filter(|a| a.hostname.as_deref() == Some(hostname))
            .cloned()
            .collect())
    }

    async fn get_asset(&self, id: &str) -> ConnectorResult<Option<AssetRecord>> {
        self.ensure_healthy().await?;
        Ok(self
            .assets
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn create_asset(&self, payload: &AssetPayload) -> ConnectorResult<AssetRecord> {
        self.counters.write().await.creates += 1;
        self.ensure_healthy().await?;

        let record = AssetRecord {
            id: format!("asset-{}", Uuid::new_v4()),
            number: payload.number.clone(),
            hostname: payload.hostname.clone(),
            protocol: Some(payload.protocol.clone()),
            ip: payload.ip.clone(),
            public_ip: payload.public_ip.clone(),
            port: Some(payload.port),
            platform: Some(payload.platform.clone()),
            comment: payload.comment.clone(),
            admin_user: payload.admin_user.clone(),
            domain: payload.domain.clone(),
            labels: payload.labels.clone(),
            nodes: payload.nodes.clone(),
        };
        self.assets.write().await.push(record.clone());
        Ok(record)
    }

    async fn update_asset(
        &self,
        id: &str,
        payload: &AssetPayload,
    ) -> ConnectorResult<AssetRecord> {
        self.counters.write().await.updates += 1;
        self.ensure_healthy().await?;

        let mut assets = self.assets.write().await;
        let record = assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ConnectorError::NotFound(format!("asset {}", id)))?;

        record.number = payload.number.clone();
        record.hostname = payload.hostname.clone();
        record.protocol = Some(payload.protocol.clone());
        record.ip = payload.ip.clone();
        record.public_ip = payload.public_ip.clone();
        record.port = Some(payload.port);
        record.platform = Some(payload.platform.clone());
        record.comment = payload.comment.clone();
        record.admin_user = payload.admin_user.clone();
        record.domain = payload.domain.clone();
        record.labels = payload.labels.clone();
        record.nodes = payload.nodes.clone();
        Ok(record.clone())
    }

    async fn delete_asset(&self, id: &str) -> ConnectorResult<bool> {
        self.counters.write().await.deletes += 1;
        self.ensure_healthy().await?;

        if self.failing_deletes.read().await.contains(id) {
            return Err(ConnectorError::RequestFailed(format!(
                "delete of {} refused",
                id
            )));
        }

        let mut assets = self.assets.write().await;
        let before = assets.len();
        assets.retain(|a| a.id != id);
        Ok(assets.len() < before)
    }

    async fn list_admin_users(&self) -> ConnectorResult<Vec<AdminUserRecord>> {
        self.counters.write().await.list_admin_users += 1;
        self.ensure_healthy().await?;
        Ok(self.admin_users.read().await.clone())
    }

    async fn list_domains(&self) -> ConnectorResult<Vec<DomainRecord>> {
        self.counters.write().await.list_domains += 1;
        self.ensure_healthy().await?;
        Ok(self.domains.read().await.clone())
    }

    async fn list_labels(&self) -> ConnectorResult<Vec<LabelRecord>> {
        self.counters.write().await.list_labels += 1;
        self.ensure_healthy().await?;
        Ok(self.labels.read().await.clone())
    }

    async fn list_nodes(&self) -> ConnectorResult<Vec<NodeRecord>> {
        self.counters.write().await.list_nodes += 1;
        self.ensure_healthy().await?;
        Ok(self.nodes.read().await.clone())
    }

    async fn list_system_users(&self) -> ConnectorResult<Vec<SystemUserRecord>> {
        self.counters.write().await.list_system_users += 1;
        self.ensure_healthy().await?;
        Ok(self.system_users.read().await.clone())
    }

    async fn start_alive_check(&self, asset_id: &str) -> ConnectorResult<Option<String>> {
        self.counters.write().await.alive_checks += 1;
        self.ensure_healthy().await?;
        if *self.triggers_refused.read().await {
            return Ok(None);
        }

        let log = if self.alive.read().await.contains(asset_id) {
            Self::passed_log(asset_id)
        } else {
            Self::failed_log(asset_id)
        };
        Ok(Some(self.stage_task("alive", log).await))
    }

    async fn start_push(&self, user_id: &str, asset_id: &str) -> ConnectorResult<Option<String>> {
        self.counters.write().await.pushes += 1;
        self.ensure_healthy().await?;
        if *self.triggers_refused.read().await {
            return Ok(None);
        }

        if *self.push_establishes.read().await {
            self.connective
                .write()
                .await
                .insert((user_id.to_string(), asset_id.to_string()));
        }
        let log = format!("PLAY [push {} to {}]\n\nTask finished", user_id, asset_id);
        Ok(Some(self.stage_task("push", log).await))
    }

    async fn start_connectivity_test(
        &self,
        user_id: &str,
        asset_id: &str,
    ) -> ConnectorResult<Option<String>> {
        self.counters.write().await.connectivity_tests += 1;
        self.ensure_healthy().await?;
        if *self.triggers_refused.read().await {
            return Ok(None);
        }

        let pair = (user_id.to_string(), asset_id.to_string());
        let log = if self.connective.read().await.contains(&pair) {
            Self::passed_log(asset_id)
        } else {
            Self::failed_log(asset_id)
        };
        Ok(Some(self.stage_task("test", log).await))
    }

    async fn task_log(&self, task_id: &str) -> ConnectorResult<Option<String>> {
        self.counters.write().await.log_fetches += 1;
        self.ensure_healthy().await?;
        Ok(self.task_logs.read().await.get(task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_payload(hostname: &str, number: &str) -> AssetPayload {
        AssetPayload {
            number: Some(number.to_string()),
            hostname: Some(hostname.to_string()),
            protocol: "ssh".to_string(),
            ip: Some("10.0.0.1".to_string()),
            public_ip: None,
            port: 22,
            platform: "Linux".to_string(),
            comment: None,
            admin_user: None,
            domain: None,
            labels: Vec::new(),
            nodes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_find_update_delete() {
        let mock = MockRegistry::new();

        let created = mock
            .create_asset(&minimal_payload("web-1", "i-1"))
            .await
            .unwrap();
        assert!(created.id.starts_with("asset-"));

        let found = mock.find_assets("web-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(mock.find_assets("web-2").await.unwrap().len(), 0);

        let mut payload = minimal_payload("web-1", "i-1");
        payload.port = 2222;
        let updated = mock.update_asset(&created.id, &payload).await.unwrap();
        assert_eq!(updated.port, Some(2222));

        assert!(mock.delete_asset(&created.id).await.unwrap());
        assert!(!mock.delete_asset(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_asset_is_not_found() {
        let mock = MockRegistry::new();
        let result = mock
            .update_asset("missing", &minimal_payload("h", "n"))
            .await;
        assert!(matches!(result, Err(ConnectorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unhealthy_mock_fails_calls() {
        let mock = MockRegistry::with_sample_data();
        mock.set_healthy(false).await;

        assert!(mock.list_admin_users().await.is_err());
        assert!(mock.start_alive_check("a-1").await.is_err());

        mock.set_healthy(true).await;
        assert!(mock.list_admin_users().await.is_ok());
    }

    #[tokio::test]
    async fn test_triggers_stage_terminal_logs() {
        let mock = MockRegistry::new();
        mock.set_alive("a-1").await;

        let task = mock.start_alive_check("a-1").await.unwrap().unwrap();
        let log = mock.task_log(&task).await.unwrap().unwrap();
        assert!(log.contains("TASK [ping] \r\nok:"));
        assert!(log.ends_with("Task finished"));

        let task = mock.start_alive_check("a-2").await.unwrap().unwrap();
        let log = mock.task_log(&task).await.unwrap().unwrap();
        assert!(!log.contains("TASK [ping] \r\nok:"));
        assert!(log.ends_with("Task finished"));
    }
}
