//! Targeted sync: push a known set of instances (or a whole profile) into
//! the registry.

use super::{push_after_sync, run_follow_ups, RunSummary, SyncOptions, WorkflowResult};
use crate::agent::{AssetAgent, SyncDisposition};
use gs_connectors::AssetsProvider;
use gs_core::InstanceAsset;
use std::time::Instant;
use tracing::{error, info, instrument};

pub struct TargetedSync<'a> {
    provider: &'a dyn AssetsProvider,
    agent: &'a AssetAgent,
    options: SyncOptions,
}

impl<'a> TargetedSync<'a> {
    pub fn new(
        provider: &'a dyn AssetsProvider,
        agent: &'a AssetAgent,
        options: SyncOptions,
    ) -> Self {
        Self {
            provider,
            agent,
            options,
        }
    }

    /// Runs the sync. `instance_ids` restricts the enumeration; `None` syncs
    /// everything the profile's selectors accept. Per-asset failures are
    /// counted and the run continues.
    #[instrument(skip(self, instance_ids), fields(profile = %self.provider.profile()))]
    pub async fn run(
        &self,
        instance_ids: Option<&[String]>,
        limit: Option<usize>,
    ) -> WorkflowResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let assets = self.provider.list_assets(instance_ids, limit).await?;
        info!(count = assets.len(), "assets to sync");

        let mut synced_assets: Vec<InstanceAsset> = Vec::new();
        for asset in assets {
            match self.agent.sync(asset.clone()).await {
                Ok(synced) => {
                    match synced.disposition {
                        SyncDisposition::Created => summary.created += 1,
                        SyncDisposition::Updated => summary.updated += 1,
                    }
                    summary.synced += 1;
                    push_after_sync(self.agent, &synced.asset, &self.options).await;
                    synced_assets.push(synced.asset);
                }
                Err(e) => {
                    error!(asset = %asset, error = %e, "failed to sync asset");
                    summary.failed += 1;
                }
            }
        }

        run_follow_ups(self.agent, &synced_assets, &self.options).await;

        summary.duration_ms = started.elapsed().as_millis() as u64;
        summary.completed_at = chrono::Utc::now();
        info!(
            synced = summary.synced,
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            "targeted sync complete"
        );
        Ok(summary)
    }
}
