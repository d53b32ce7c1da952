//! SQS task-queue adapter.
//!
//! Messages carry a JSON body, `{"profile": "...", "instances": [...]}`.
//! A processed message is deleted; a failed one is left alone and reappears
//! after the queue's visibility timeout. Malformed bodies are deleted on
//! sight so they cannot loop forever.

use super::ListenConfig;
use crate::traits::{ConnectorError, ConnectorResult, SyncRequest, TaskQueue};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs as sqs;
use tracing::{debug, instrument, warn};

pub struct SqsTaskQueue {
    client: sqs::Client,
    config: ListenConfig,
}

impl SqsTaskQueue {
    /// Builds the queue client. Credentials and region come from the
    /// standard AWS sources; the queue URL pins the endpoint.
    pub async fn new(config: ListenConfig) -> ConnectorResult<Self> {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Ok(Self {
            client: sqs::Client::new(&shared),
            config,
        })
    }

    async fn delete_message(&self, receipt: &str) -> ConnectorResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| ConnectorError::Provider(format!("DeleteMessage failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for SqsTaskQueue {
    #[instrument(skip(self))]
    async fn poll(&self) -> ConnectorResult<Vec<SyncRequest>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .max_number_of_messages(self.config.max_messages)
            .wait_time_seconds(self.config.wait_secs)
            .send()
            .await
            .map_err(|e| ConnectorError::Provider(format!("ReceiveMessage failed: {}", e)))?;

        let mut requests = Vec::new();
        for message in response.messages() {
            let receipt = message.receipt_handle().unwrap_or_default().to_string();
            let body = message.body().unwrap_or_default();

            match serde_json::from_str::<SyncRequest>(body) {
                Ok(mut request) => {
                    request.receipt = receipt;
                    requests.push(request);
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed queue message");
                    if !receipt.is_empty() {
                        self.delete_message(&receipt).await?;
                    }
                }
            }
        }
        Ok(requests)
    }

    async fn finish(&self, request: &SyncRequest) -> ConnectorResult<()> {
        self.delete_message(&request.receipt).await
    }

    async fn fail(&self, request: &SyncRequest) -> ConnectorResult<()> {
        // Left on the queue; SQS redelivers after the visibility timeout
        debug!(profile = %request.profile, "leaving failed request for redelivery");
        Ok(())
    }
}
