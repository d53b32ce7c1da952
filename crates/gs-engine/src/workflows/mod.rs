//! Reconciliation workflows.
//!
//! Each workflow drives one run shape: [`TargetedSync`] syncs explicit
//! instances or a whole profile, [`SmartSync`] diffs a profile against the
//! registry by instance number, [`CleanAssets`] deletes a profile's stale
//! records, and [`ListenLoop`] turns queue messages into targeted runs.
//!
//! Per-asset failures are logged and counted; only provider enumeration,
//! registry listing, and configuration problems abort a run.

pub mod clean;
pub mod listen;
pub mod smart;
pub mod targeted;

pub use clean::{CleanAssets, CleanOptions};
pub use listen::ListenLoop;
pub use smart::SmartSync;
pub use targeted::TargetedSync;

use crate::agent::AssetAgent;
use chrono::{DateTime, Utc};
use gs_connectors::registry::ConfirmOptions;
use gs_connectors::ConnectorError;
use gs_core::InstanceAsset;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

/// Errors that abort a reconciliation run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Options governing one reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Trigger credential pushes for each synced asset.
    pub push: bool,
    /// Verify pushed credentials after the run, re-pushing on failure.
    pub push_check: bool,
    /// Push unconditionally on the first push-check round.
    pub force_push: bool,
    /// Run a liveness probe against each synced asset after the run.
    pub test_asset: bool,
    /// Comma-separated system users to push; `None` means all of them.
    pub push_system_users: Option<String>,
    /// Poll budget for task confirmations.
    pub confirm: ConfirmOptions,
    /// Retry budget for push-checks.
    pub push_max_tries: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            push: false,
            push_check: false,
            force_push: false,
            test_asset: false,
            push_system_users: None,
            confirm: ConfirmOptions::default(),
            push_max_tries: 3,
        }
    }
}

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Assets written to the registry (created plus updated).
    pub synced: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Assets that could not be synced or deleted.
    pub failed: usize,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            synced: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            failed: 0,
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }
}

impl RunSummary {
    pub fn total_changes(&self) -> usize {
        self.synced + self.deleted
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Keeps the registry assets whose provenance comment names `profile`.
pub(crate) fn scope_to_profile(assets: Vec<InstanceAsset>, profile: &str) -> Vec<InstanceAsset> {
    assets
        .into_iter()
        .filter(|asset| asset.comment_account().as_deref() == Some(profile))
        .collect()
}

/// Triggers credential pushes for one freshly synced asset.
pub(crate) async fn push_after_sync(
    agent: &AssetAgent,
    asset: &InstanceAsset,
    options: &SyncOptions,
) {
    if !options.push {
        return;
    }
    if let Some(id) = asset.id.as_deref() {
        let task_ids = agent
            .push_system_users(id, options.push_system_users.as_deref())
            .await;
        info!(asset = %asset, queued = task_ids.len(), "triggered credential pushes");
    }
}

/// Post-run follow-ups over the synced set: liveness probes and
/// push-checks, each gated by its option.
pub(crate) async fn run_follow_ups(
    agent: &AssetAgent,
    assets: &[InstanceAsset],
    options: &SyncOptions,
) {
    if options.test_asset {
        for asset in assets {
            let id = match asset.id.as_deref() {
                Some(id) => id,
                None => continue,
            };
            if agent.check_alive(id, &options.confirm).await {
                info!(asset = %asset, "asset is alive");
            } else {
                error!(asset = %asset, "asset is not alive");
            }
        }
    }

    if options.push_check {
        for asset in assets {
            let id = match asset.id.as_deref() {
                Some(id) => id,
                None => continue,
            };
            agent
                .push_check_system_users(
                    id,
                    options.push_system_users.as_deref(),
                    &options.confirm,
                    options.push_max_tries,
                    options.force_push,
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_to_profile() {
        let mut in_scope = InstanceAsset::new();
        in_scope.put_comment(&[("provider", "aws"), ("account", "prod"), ("region", "r1")]);

        let mut other = InstanceAsset::new();
        other.put_comment(&[("provider", "aws"), ("account", "qa"), ("region", "r1")]);

        let no_comment = InstanceAsset::new();

        let scoped = scope_to_profile(vec![in_scope, other, no_comment], "prod");
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].comment_account().as_deref(), Some("prod"));
    }

    #[test]
    fn test_summary_counters() {
        let summary = RunSummary {
            synced: 3,
            created: 2,
            updated: 1,
            deleted: 2,
            failed: 0,
            ..RunSummary::default()
        };
        assert_eq!(summary.total_changes(), 5);
        assert!(summary.is_clean());
    }
}
