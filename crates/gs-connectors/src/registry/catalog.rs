//! Per-run catalog of registry resource listings.
//!
//! Linking resolves names to ids (and back) against the registry's admin
//! users, domains, labels, nodes, and system users. Each kind is listed at
//! most once per catalog lifetime; a reconciliation run builds a fresh
//! catalog so renames are picked up between runs but not within one.
//!
//! Listing failures degrade to an empty listing, so a flaky registry turns
//! into unresolved references rather than an aborted run.

use super::api::RegistryApi;
use super::nodes;
use super::resources::{
    AdminUserRecord, DomainRecord, LabelRecord, NodeRecord, SystemUserRecord,
};
use gs_core::Tag;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

type Cached<T> = RwLock<Option<Arc<Vec<T>>>>;

pub struct Catalog {
    api: Arc<dyn RegistryApi>,
    admin_users: Cached<AdminUserRecord>,
    domains: Cached<DomainRecord>,
    labels: Cached<LabelRecord>,
    nodes: Cached<NodeRecord>,
    system_users: Cached<SystemUserRecord>,
}

impl Catalog {
    pub fn new(api: Arc<dyn RegistryApi>) -> Self {
        Self {
            api,
            admin_users: RwLock::new(None),
            domains: RwLock::new(None),
            labels: RwLock::new(None),
            nodes: RwLock::new(None),
            system_users: RwLock::new(None),
        }
    }

    /// Drops every cached listing; the next resolution lists again.
    pub async fn clear(&self) {
        *self.admin_users.write().await = None;
        *self.domains.write().await = None;
        *self.labels.write().await = None;
        *self.nodes.write().await = None;
        *self.system_users.write().await = None;
    }

    pub async fn admin_users(&self) -> Arc<Vec<AdminUserRecord>> {
        if let Some(cached) = self.admin_users.read().await.as_ref() {
            debug!("admin-user listing served from catalog");
            return Arc::clone(cached);
        }
        let listing = Arc::new(self.fetch("admin-user", self.api.list_admin_users()).await);
        *self.admin_users.write().await = Some(Arc::clone(&listing));
        listing
    }

    pub async fn domains(&self) -> Arc<Vec<DomainRecord>> {
        if let Some(cached) = self.domains.read().await.as_ref() {
            debug!("domain listing served from catalog");
            return Arc::clone(cached);
        }
        let listing = Arc::new(self.fetch("domain", self.api.list_domains()).await);
        *self.domains.write().await = Some(Arc::clone(&listing));
        listing
    }

    pub async fn labels(&self) -> Arc<Vec<LabelRecord>> {
        if let Some(cached) = self.labels.read().await.as_ref() {
            debug!("label listing served from catalog");
            return Arc::clone(cached);
        }
        let listing = Arc::new(self.fetch("label", self.api.list_labels()).await);
        *self.labels.write().await = Some(Arc::clone(&listing));
        listing
    }

    pub async fn nodes(&self) -> Arc<Vec<NodeRecord>> {
        if let Some(cached) = self.nodes.read().await.as_ref() {
            debug!("node listing served from catalog");
            return Arc::clone(cached);
        }
        let listing = Arc::new(self.fetch("node", self.api.list_nodes()).await);
        *self.nodes.write().await = Some(Arc::clone(&listing));
        listing
    }

    pub async fn system_users(&self) -> Arc<Vec<SystemUserRecord>> {
        if let Some(cached) = self.system_users.read().await.as_ref() {
            debug!("system-user listing served from catalog");
            return Arc::clone(cached);
        }
        let listing = Arc::new(self.fetch("system-user", self.api.list_system_users()).await);
        *self.system_users.write().await = Some(Arc::clone(&listing));
        listing
    }

    async fn fetch<T>(
        &self,
        kind: &str,
        request: impl std::future::Future<Output = crate::traits::ConnectorResult<Vec<T>>>,
    ) -> Vec<T> {
        match request.await {
            Ok(records) => records,
            Err(e) => {
                warn!(kind, error = %e, "failed to list registry resources, treating as empty");
                Vec::new()
            }
        }
    }

    pub async fn get_admin_user_id(&self, name: &str) -> Option<String> {
        let records = self.admin_users().await;
        let mut matches = records.iter().filter(|r| r.name == name);
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(kind = "admin-user", name, "multiple records share this name, using the first");
        }
        Some(first.id.clone())
    }

    pub async fn get_admin_user_name(&self, id: &str) -> Option<String> {
        let records = self.admin_users().await;
        records.iter().find(|r| r.id == id).map(|r| r.name.clone())
    }

    pub async fn get_domain_id(&self, name: &str) -> Option<String> {
        let records = self.domains().await;
        let mut matches = records.iter().filter(|r| r.name == name);
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(kind = "domain", name, "multiple records share this name, using the first");
        }
        Some(first.id.clone())
    }

    pub async fn get_domain_name(&self, id: &str) -> Option<String> {
        let records = self.domains().await;
        records.iter().find(|r| r.id == id).map(|r| r.name.clone())
    }

    /// Resolves a label by key and value. Labels are only equal when both
    /// sides match.
    pub async fn get_label_id(&self, label: &Tag) -> Option<String> {
        let records = self.labels().await;
        let mut matches = records
            .iter()
            .filter(|r| r.name == label.key && r.value == label.value);
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(kind = "label", label = %label, "multiple records share this pair, using the first");
        }
        Some(first.id.clone())
    }

    pub async fn get_label(&self, id: &str) -> Option<Tag> {
        let records = self.labels().await;
        records
            .iter()
            .find(|r| r.id == id)
            .map(|r| Tag::new(&r.name, &r.value))
    }

    /// Resolves a `/`-delimited node path to the leaf node id.
    pub async fn get_node_id(&self, path: &str) -> Option<String> {
        let records = self.nodes().await;
        nodes::resolve_node_path(&records, path)
    }

    /// Resolves a node id back to its full path.
    pub async fn get_node_path(&self, id: &str) -> Option<String> {
        let records = self.nodes().await;
        nodes::node_full_path(&records, id)
    }

    pub async fn get_system_user_id(&self, name: &str) -> Option<String> {
        let records = self.system_users().await;
        let mut matches = records.iter().filter(|r| r.name == name);
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(kind = "system-user", name, "multiple records share this name, using the first");
        }
        Some(first.id.clone())
    }

    pub async fn get_system_user_name(&self, id: &str) -> Option<String> {
        let records = self.system_users().await;
        records.iter().find(|r| r.id == id).map(|r| r.name.clone())
    }
}
