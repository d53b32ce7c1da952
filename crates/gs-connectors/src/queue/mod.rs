//! Inbound task queues.
//!
//! Listen mode pulls [`SyncRequest`](crate::traits::SyncRequest) messages
//! from a queue and reconciles the named instances. Delivery is
//! at-least-once; acknowledgment happens only after a request was processed.

pub mod mock;
pub mod sqs;

pub use mock::MockTaskQueue;
pub use sqs::SqsTaskQueue;

use serde::{Deserialize, Serialize};

fn default_wait_secs() -> i32 {
    10
}

fn default_max_messages() -> i32 {
    10
}

/// Queue transport settings for listen mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// SQS queue URL.
    pub queue_url: String,

    /// Long-poll wait, 0 to 20 seconds.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: i32,

    /// Messages pulled per poll, 1 to 10.
    #[serde(default = "default_max_messages")]
    pub max_messages: i32,

    /// Profiles served in listen mode; `None` serves every configured
    /// profile.
    #[serde(default)]
    pub profiles: Option<Vec<String>>,
}
