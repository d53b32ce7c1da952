//! Clean-up: delete registry records whose instance no longer answers.
//!
//! Candidates are the registry's assets, optionally narrowed to one
//! profile's provenance and to explicit instance numbers. Each candidate is
//! probed with the registry's liveness check and kept if it answers;
//! `include_all` skips the probe and deletes every candidate.

use super::{scope_to_profile, RunSummary, WorkflowResult};
use crate::agent::AssetAgent;
use gs_connectors::registry::ConfirmOptions;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// What to clean and whether to probe before deleting.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Restrict to records whose provenance comment names this profile.
    pub profile: Option<String>,
    /// Restrict to these instance numbers; empty means all candidates.
    pub instance_numbers: Vec<String>,
    /// Delete without probing liveness first.
    pub include_all: bool,
    /// Poll budget for the liveness probes.
    pub confirm: ConfirmOptions,
}

pub struct CleanAssets<'a> {
    agent: &'a AssetAgent,
    options: CleanOptions,
}

impl<'a> CleanAssets<'a> {
    pub fn new(agent: &'a AssetAgent, options: CleanOptions) -> Self {
        Self { agent, options }
    }

    #[instrument(skip(self), fields(profile = self.options.profile.as_deref()))]
    pub async fn run(&self) -> WorkflowResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let mut candidates = self.agent.registry_assets().await?;
        if let Some(profile) = self.options.profile.as_deref() {
            candidates = scope_to_profile(candidates, profile);
        }
        if !self.options.instance_numbers.is_empty() {
            candidates.retain(|asset| {
                asset
                    .number
                    .as_deref()
                    .map_or(false, |number| {
                        self.options.instance_numbers.iter().any(|n| n == number)
                    })
            });
        }
        info!(count = candidates.len(), "clean-up candidates");

        for asset in &candidates {
            let id = match asset.id.as_deref() {
                Some(id) => id,
                None => continue,
            };

            if !self.options.include_all && self.agent.check_alive(id, &self.options.confirm).await
            {
                info!(asset = %asset, "asset is alive, keeping");
                continue;
            }

            match self.agent.delete(id).await {
                Ok(true) => {
                    info!(asset = %asset, "deleted asset");
                    summary.deleted += 1;
                }
                Ok(false) => {
                    warn!(asset = %asset, "asset was already gone");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(asset = %asset, error = %e, "failed to delete asset");
                    summary.failed += 1;
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        summary.completed_at = chrono::Utc::now();
        info!(
            deleted = summary.deleted,
            failed = summary.failed,
            "clean-up complete"
        );
        Ok(summary)
    }
}
