//! Queue-driven reconciliation.
//!
//! Each queue message names a profile and optionally explicit instances;
//! the loop turns it into a targeted sync against that profile's provider
//! and a fresh agent. Requests are acknowledged only after the run
//! succeeds, so an interrupted run is redelivered.

use super::{RunSummary, SyncOptions, TargetedSync, WorkflowError, WorkflowResult};
use crate::agent::AssetAgent;
use gs_connectors::{AssetsProvider, RegistryApi, SyncRequest, TaskQueue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct ListenLoop<'a> {
    queue: &'a dyn TaskQueue,
    api: Arc<dyn RegistryApi>,
    /// Providers are built once at startup; every `list_assets` call is a
    /// fresh enumeration, so reuse across requests loses nothing.
    providers: &'a BTreeMap<String, Box<dyn AssetsProvider>>,
    options: SyncOptions,
}

impl<'a> ListenLoop<'a> {
    pub fn new(
        queue: &'a dyn TaskQueue,
        api: Arc<dyn RegistryApi>,
        providers: &'a BTreeMap<String, Box<dyn AssetsProvider>>,
        options: SyncOptions,
    ) -> Self {
        Self {
            queue,
            api,
            providers,
            options,
        }
    }

    /// Pulls one batch and processes every request in it. Returns the batch
    /// size; a poll failure is the only error.
    pub async fn run_once(&self) -> WorkflowResult<usize> {
        let requests = self.queue.poll().await?;
        let handled = requests.len();

        for request in requests {
            match self.process(&request).await {
                Ok(summary) => {
                    info!(
                        profile = %request.profile,
                        synced = summary.synced,
                        deleted = summary.deleted,
                        failed = summary.failed,
                        "processed sync request"
                    );
                    if let Err(e) = self.queue.finish(&request).await {
                        warn!(profile = %request.profile, error = %e, "failed to acknowledge request");
                    }
                }
                Err(e) => {
                    error!(
                        profile = %request.profile,
                        error = %e,
                        "sync request failed, leaving for redelivery"
                    );
                    if let Err(e) = self.queue.fail(&request).await {
                        warn!(profile = %request.profile, error = %e, "failed to release request");
                    }
                }
            }
        }

        Ok(handled)
    }

    /// Polls until the process is stopped. Long polling in the queue paces
    /// the loop; only poll failures trigger an explicit backoff.
    pub async fn run(&self) {
        info!(profiles = self.providers.len(), "listening for sync requests");
        loop {
            match self.run_once().await {
                Ok(0) => {}
                Ok(handled) => debug!(handled, "processed request batch"),
                Err(e) => {
                    error!(error = %e, "queue poll failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }

    #[instrument(skip(self, request), fields(profile = %request.profile))]
    async fn process(&self, request: &SyncRequest) -> WorkflowResult<RunSummary> {
        let provider = self.providers.get(&request.profile).ok_or_else(|| {
            WorkflowError::Config(format!("unknown profile '{}'", request.profile))
        })?;

        // A fresh agent per request bounds catalog staleness by the request.
        let agent = AssetAgent::new(Arc::clone(&self.api));
        let instance_ids =
            (!request.instances.is_empty()).then_some(request.instances.as_slice());
        TargetedSync::new(provider.as_ref(), &agent, self.options.clone())
            .run(instance_ids, None)
            .await
    }
}
