//! HTTP implementation of the registry API.

use super::api::RegistryApi;
use super::resources::{
    AdminUserRecord, AssetPayload, AssetRecord, DomainRecord, LabelRecord, NodeRecord,
    SystemUserRecord, ADMIN_USERS_PATH, ASSETS_PATH, DOMAINS_PATH, LABELS_PATH, NODES_PATH,
    SYSTEM_USERS_PATH, TASKS_PATH,
};
use crate::http::{HttpClient, RegistryConfig};
use crate::traits::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

/// Registry connector speaking the HTTP API.
pub struct RegistryClient {
    http: HttpClient,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> ConnectorResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    async fn list_kind<T: DeserializeOwned>(&self, path: &str) -> ConnectorResult<Vec<T>> {
        let value = self.http.get_json(path, &[]).await?;
        parse_records(value)
    }

    /// Extracts the task id from a trigger response, `{"task": "<id>"}`.
    fn task_id_of(value: &Value) -> Option<String> {
        value
            .get("task")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

fn parse_records<T: DeserializeOwned>(value: Value) -> ConnectorResult<Vec<T>> {
    serde_json::from_value(value).map_err(|e| ConnectorError::InvalidResponse(e.to_string()))
}

fn parse_record<T: DeserializeOwned>(value: Value) -> ConnectorResult<T> {
    serde_json::from_value(value).map_err(|e| ConnectorError::InvalidResponse(e.to_string()))
}

fn to_body(payload: &AssetPayload) -> ConnectorResult<Value> {
    serde_json::to_value(payload).map_err(|e| ConnectorError::Internal(e.to_string()))
}

#[async_trait]
impl RegistryApi for RegistryClient {
    #[instrument(skip(self))]
    async fn list_assets(&self) -> ConnectorResult<Vec<AssetRecord>> {
        self.list_kind(ASSETS_PATH).await
    }

    #[instrument(skip(self))]
    async fn find_assets(&self, hostname: &str) -> ConnectorResult<Vec<AssetRecord>> {
        let value = self
            .http
            .get_json(ASSETS_PATH, &[("hostname", hostname)])
            .await?;
        parse_records(value)
    }

    #[instrument(skip(self))]
    async fn get_asset(&self, id: &str) -> ConnectorResult<Option<AssetRecord>> {
        let path = format!("{}/{}", ASSETS_PATH, id);
        match self.http.get_json(&path, &[]).await {
            Ok(value) => parse_record(value).map(Some),
            Err(ConnectorError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, payload), fields(hostname = ?payload.hostname))]
    async fn create_asset(&self, payload: &AssetPayload) -> ConnectorResult<AssetRecord> {
        let body = to_body(payload)?;
        let value = self.http.post_json(ASSETS_PATH, &body).await?;
        parse_record(value)
    }

    #[instrument(skip(self, payload))]
    async fn update_asset(
        &self,
        id: &str,
        payload: &AssetPayload,
    ) -> ConnectorResult<AssetRecord> {
        let body = to_body(payload)?;
        let path = format!("{}/{}", ASSETS_PATH, id);
        let value = self.http.put_json(&path, &body).await?;
        parse_record(value)
    }

    #[instrument(skip(self))]
    async fn delete_asset(&self, id: &str) -> ConnectorResult<bool> {
        let path = format!("{}/{}", ASSETS_PATH, id);
        match self.http.delete(&path).await {
            Ok(()) => Ok(true),
            Err(ConnectorError::NotFound(_)) => {
                debug!(id, "asset already absent from the registry");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_admin_users(&self) -> ConnectorResult<Vec<AdminUserRecord>> {
        self.list_kind(ADMIN_USERS_PATH).await
    }

    async fn list_domains(&self) -> ConnectorResult<Vec<DomainRecord>> {
        self.list_kind(DOMAINS_PATH).await
    }

    async fn list_labels(&self) -> ConnectorResult<Vec<LabelRecord>> {
        self.list_kind(LABELS_PATH).await
    }

    async fn list_nodes(&self) -> ConnectorResult<Vec<NodeRecord>> {
        self.list_kind(NODES_PATH).await
    }

    async fn list_system_users(&self) -> ConnectorResult<Vec<SystemUserRecord>> {
        self.list_kind(SYSTEM_USERS_PATH).await
    }

    #[instrument(skip(self))]
    async fn start_alive_check(&self, asset_id: &str) -> ConnectorResult<Option<String>> {
        let path = format!("{}/{}/alive", ASSETS_PATH, asset_id);
        let value = self.http.get_json(&path, &[]).await?;
        Ok(Self::task_id_of(&value))
    }

    #[instrument(skip(self))]
    async fn start_push(&self, user_id: &str, asset_id: &str) -> ConnectorResult<Option<String>> {
        let path = format!("{}/{}/asset/{}/push", SYSTEM_USERS_PATH, user_id, asset_id);
        let value = self.http.get_json(&path, &[]).await?;
        Ok(Self::task_id_of(&value))
    }

    #[instrument(skip(self))]
    async fn start_connectivity_test(
        &self,
        user_id: &str,
        asset_id: &str,
    ) -> ConnectorResult<Option<String>> {
        let path = format!("{}/{}/asset/{}/test", SYSTEM_USERS_PATH, user_id, asset_id);
        let value = self.http.get_json(&path, &[]).await?;
        Ok(Self::task_id_of(&value))
    }

    async fn task_log(&self, task_id: &str) -> ConnectorResult<Option<String>> {
        let path = format!("{}/{}/log", TASKS_PATH, task_id);
        match self.http.get_json(&path, &[]).await {
            Ok(value) => Ok(value
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string)),
            Err(ConnectorError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
