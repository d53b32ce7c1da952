//! Mock task queue for testing.

use crate::traits::{ConnectorResult, SyncRequest, TaskQueue};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory queue. `poll` drains everything pending; `finish` and `fail`
/// record receipts so tests can assert on acknowledgment order.
pub struct MockTaskQueue {
    pending: Arc<RwLock<Vec<SyncRequest>>>,
    finished: Arc<RwLock<Vec<String>>>,
    failed: Arc<RwLock<Vec<String>>>,
}

impl MockTaskQueue {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(Vec::new())),
            finished: Arc::new(RwLock::new(Vec::new())),
            failed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Enqueues a request under the given receipt.
    pub async fn push(&self, profile: &str, instances: &[&str], receipt: &str) {
        self.pending.write().await.push(SyncRequest {
            profile: profile.to_string(),
            instances: instances.iter().map(|s| s.to_string()).collect(),
            receipt: receipt.to_string(),
        });
    }

    pub async fn finished_receipts(&self) -> Vec<String> {
        self.finished.read().await.clone()
    }

    pub async fn failed_receipts(&self) -> Vec<String> {
        self.failed.read().await.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}

impl Default for MockTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for MockTaskQueue {
    async fn poll(&self) -> ConnectorResult<Vec<SyncRequest>> {
        Ok(self.pending.write().await.drain(..).collect())
    }

    async fn finish(&self, request: &SyncRequest) -> ConnectorResult<()> {
        self.finished.write().await.push(request.receipt.clone());
        Ok(())
    }

    async fn fail(&self, request: &SyncRequest) -> ConnectorResult<()> {
        self.failed.write().await.push(request.receipt.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_drains_pending() {
        let queue = MockTaskQueue::new();
        queue.push("prod", &["i-1"], "r-1").await;
        queue.push("prod", &[], "r-2").await;

        let batch = queue.poll().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.pending_count().await, 0);
        assert!(queue.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receipts_recorded() {
        let queue = MockTaskQueue::new();
        queue.push("prod", &[], "r-1").await;

        let batch = queue.poll().await.unwrap();
        queue.finish(&batch[0]).await.unwrap();
        queue.fail(&batch[0]).await.unwrap();

        assert_eq!(queue.finished_receipts().await, vec!["r-1"]);
        assert_eq!(queue.failed_receipts().await, vec!["r-1"]);
    }
}
