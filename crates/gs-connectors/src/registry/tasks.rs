//! Asynchronous task confirmation.
//!
//! Registry actions (liveness probes, credential pushes, connectivity tests)
//! run out of band on the registry's job runner; the trigger endpoint only
//! hands back a task id. Completion is observed by polling the task log
//! until a finish marker appears or the attempt budget runs out. Every fetch
//! returns a full snapshot that replaces the previously captured output.

use super::api::RegistryApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Marker the job runner appends when a task completes, looked for at the
/// very end of the snapshot.
pub const FINISHED_MARKER: &str = "Task finished";

/// Marker present in the captured output of a successful probe.
pub const PASSED_MARKER: &str = "TASK [ping] \r\nok:";

/// How many trailing characters of the snapshot are scanned for
/// [`FINISHED_MARKER`].
const FINISHED_WINDOW: usize = 20;

/// Delay before the first poll, giving the remote job time to start.
const SETTLE_DELAY: Duration = Duration::from_secs(3);

fn default_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    3
}

/// Poll budget and verbosity for one task confirmation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfirmOptions {
    /// Total seconds to wait for completion.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between log fetches.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Stream each fetched snapshot at info level.
    #[serde(default)]
    pub show_task_log: bool,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            interval_secs: default_interval_secs(),
            show_task_log: false,
        }
    }
}

/// Outcome of waiting on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The finish marker appeared; `output` is the last captured snapshot.
    Finished { output: String },
    /// The attempt budget ran out; `output` is whatever was captured.
    TimedOut { output: String },
}

impl TaskOutcome {
    pub fn output(&self) -> &str {
        match self {
            Self::Finished { output } | Self::TimedOut { output } => output,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }

    /// True when the task finished and its output carries the passed marker.
    /// A timed-out task never passes, whatever its partial output says.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Finished { output } if output.contains(PASSED_MARKER))
    }
}

/// Watches registry tasks to completion and drives the probe flows built on
/// top of them.
pub struct TaskMonitor {
    api: Arc<dyn RegistryApi>,
}

impl TaskMonitor {
    pub fn new(api: Arc<dyn RegistryApi>) -> Self {
        Self { api }
    }

    /// Waits for a task to finish: settle delay, then one log fetch per
    /// interval, at most `floor(timeout / interval)` fetches.
    ///
    /// A failed log fetch consumes an attempt and polling continues.
    pub async fn await_task(&self, task_id: &str, opts: &ConfirmOptions) -> TaskOutcome {
        let interval = opts.interval_secs.max(1);
        let attempts = opts.timeout_secs / interval;
        let mut output = String::new();

        sleep(SETTLE_DELAY).await;
        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(Duration::from_secs(interval)).await;
            }
            match self.api.task_log(task_id).await {
                Ok(Some(snapshot)) => {
                    output = snapshot;
                    if opts.show_task_log {
                        info!(task_id, "{}", output);
                    }
                    if tail(&output, FINISHED_WINDOW).contains(FINISHED_MARKER) {
                        return TaskOutcome::Finished { output };
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(task_id, error = %e, "failed to fetch task log"),
            }
        }

        warn!(task_id, "task did not finish within the poll budget");
        TaskOutcome::TimedOut { output }
    }

    /// Runs a liveness probe against an asset. False when the trigger is
    /// refused, the task times out, or the probe output lacks the passed
    /// marker.
    pub async fn check_alive(&self, asset_id: &str, opts: &ConfirmOptions) -> bool {
        match self.api.start_alive_check(asset_id).await {
            Ok(Some(task_id)) => self.await_task(&task_id, opts).await.passed(),
            Ok(None) => {
                warn!(asset_id, "liveness probe was not accepted");
                false
            }
            Err(e) => {
                warn!(asset_id, error = %e, "failed to trigger liveness probe");
                false
            }
        }
    }

    /// Tests whether a pushed credential can log in to an asset.
    pub async fn check_connective(
        &self,
        user_id: &str,
        asset_id: &str,
        opts: &ConfirmOptions,
    ) -> bool {
        match self.api.start_connectivity_test(user_id, asset_id).await {
            Ok(Some(task_id)) => self.await_task(&task_id, opts).await.passed(),
            Ok(None) => {
                warn!(user_id, asset_id, "connectivity test was not accepted");
                false
            }
            Err(e) => {
                warn!(user_id, asset_id, error = %e, "failed to trigger connectivity test");
                false
            }
        }
    }

    /// Pushes a credential until it verifies, within a bounded retry budget.
    ///
    /// Each round checks connectivity first and stops when it passes; with
    /// `force_push` the very first round pushes unconditionally. A round that
    /// pushed re-checks connectivity once the push task finished.
    pub async fn push_checked(
        &self,
        user_id: &str,
        asset_id: &str,
        opts: &ConfirmOptions,
        max_tries: u32,
        force_push: bool,
    ) -> bool {
        let mut force_push = force_push;

        for _ in 0..max_tries {
            if force_push {
                force_push = false;
            } else if self.check_connective(user_id, asset_id, opts).await {
                return true;
            }

            match self.api.start_push(user_id, asset_id).await {
                Ok(Some(task_id)) => {
                    let outcome = self.await_task(&task_id, opts).await;
                    if outcome.is_finished()
                        && self.check_connective(user_id, asset_id, opts).await
                    {
                        return true;
                    }
                }
                Ok(None) => warn!(user_id, asset_id, "credential push was not accepted"),
                Err(e) => {
                    warn!(user_id, asset_id, error = %e, "failed to trigger credential push")
                }
            }
        }

        error!(user_id, asset_id, max_tries, "credential push exhausted its retry budget");
        false
    }
}

/// Char-boundary-safe suffix of at most `window` bytes.
fn tail(s: &str, window: usize) -> &str {
    let mut start = s.len().saturating_sub(window);
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
