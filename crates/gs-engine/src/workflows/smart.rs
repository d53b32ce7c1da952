//! Smart sync: diff a profile's live inventory against the registry and
//! apply only the difference.
//!
//! The join key is the instance number. Instances unknown to the registry
//! are synced in, registry records whose number left the inventory are
//! deleted, and records present on both sides are left untouched. Only
//! records whose provenance comment names the profile are considered on the
//! registry side, so assets of other profiles (or hand-created ones without
//! provenance) are never deleted.

use super::{
    push_after_sync, run_follow_ups, scope_to_profile, RunSummary, SyncOptions, WorkflowResult,
};
use crate::agent::{AssetAgent, SyncDisposition};
use gs_connectors::AssetsProvider;
use gs_core::InstanceAsset;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub struct SmartSync<'a> {
    provider: &'a dyn AssetsProvider,
    agent: &'a AssetAgent,
    options: SyncOptions,
}

impl<'a> SmartSync<'a> {
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

    #[instrument(skip(self), fields(profile = %self.provider.profile()))]
    pub async fn run(&self) -> WorkflowResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let provider_assets = self.provider.list_assets(None, None).await?;
        let registry_assets = scope_to_profile(
            self.agent.registry_assets().await?,
            self.provider.profile(),
        );

        let registry_numbers: HashSet<&str> = registry_assets
            .iter()
            .filter_map(|asset| asset.number.as_deref())
            .collect();
        let provider_numbers: HashSet<&str> = provider_assets
            .iter()
            .filter_map(|asset| asset.number.as_deref())
            .collect();

        let mut untouched = 0usize;
        let mut synced_assets: Vec<InstanceAsset> = Vec::new();
        for asset in &provider_assets {
            let number = match asset.number.as_deref() {
                Some(number) => number,
                None => continue,
            };
            if registry_numbers.contains(number) {
                untouched += 1;
                continue;
            }

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
                    error!(asset = %asset, error = %e, "failed to sync new asset");
                    summary.failed += 1;
                }
            }
        }

        // Registry records whose instance is gone, including records that
        // lost their number entirely
        for asset in &registry_assets {
            let still_present = asset
                .number
                .as_deref()
                .map_or(false, |number| provider_numbers.contains(number));
            if still_present {
                continue;
            }

            let id = match asset.id.as_deref() {
                Some(id) => id,
                None => continue,
            };
            match self.agent.delete(id).await {
                Ok(true) => {
                    info!(asset = %asset, "deleted stale registry asset");
                    summary.deleted += 1;
                }
                Ok(false) => {
                    warn!(asset = %asset, "stale registry asset was already gone");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(asset = %asset, error = %e, "failed to delete stale registry asset");
                    summary.failed += 1;
                }
            }
        }

        debug!(untouched, "assets present on both sides");

        run_follow_ups(self.agent, &synced_assets, &self.options).await;

        summary.duration_ms = started.elapsed().as_millis() as u64;
        summary.completed_at = chrono::Utc::now();
        info!(
            synced = summary.synced,
            deleted = summary.deleted,
            untouched,
            failed = summary.failed,
            "smart sync complete"
        );
        Ok(summary)
    }
}
