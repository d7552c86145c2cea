//! The worker's pull loop on the request subscription.

use crate::pipeline::DeckPipeline;
use qdeck_core::service::{ServiceHandle, ServiceState};
use qdeck_core::{DeckReply, GenerateRequest, RequestId, Result};
use qdeck_pubsub::{PubsubClient, PubsubMessage, REQUEST_ID_ATTRIBUTE, ReceivedMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Messages fetched per pull. Generation is slow, so batches stay small
/// to keep redelivered work bounded on a crash.
const PULL_BATCH_SIZE: u32 = 10;

/// Pause after an empty batch; emulators answer empty pulls immediately.
const EMPTY_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Pause after a pull error before trying again.
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Consumes generation requests and publishes the outcome as replies.
///
/// A message is acknowledged only after its reply has been published,
/// so a crash mid-generation redelivers the request instead of losing
/// it. Requests that cannot be decoded are answered with a failure when
/// they carry a correlation attribute, and dropped otherwise.
pub struct RequestWorker {
    client: Arc<PubsubClient>,
    request_subscription: String,
    reply_topic: String,
    pipeline: Arc<DeckPipeline>,
    handle: ServiceHandle,
}

impl RequestWorker {
    /// Creates a worker consuming `request_subscription` and answering
    /// on `reply_topic`.
    pub fn new(
        client: Arc<PubsubClient>,
        request_subscription: impl Into<String>,
        reply_topic: impl Into<String>,
        pipeline: Arc<DeckPipeline>,
    ) -> Self {
        Self {
            client,
            request_subscription: request_subscription.into(),
            reply_topic: reply_topic.into(),
            pipeline,
            handle: ServiceHandle::new("request-worker"),
        }
    }

    /// Returns a handle observing this worker's lifecycle.
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Pulls and processes requests until `shutdown` flips to `true`.
    ///
    /// The handle reaches [`ServiceState::Ready`] after the first
    /// successful pull. An in-flight request finishes before shutdown
    /// takes effect.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        self.handle.set_state(ServiceState::Starting);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                batch = self.client.pull(&self.request_subscription, PULL_BATCH_SIZE) => {
                    match batch {
                        Ok(batch) => {
                            if !self.handle.state().is_ready() {
                                self.handle.set_state(ServiceState::Ready);
                            }
                            if batch.is_empty() {
                                tokio::time::sleep(EMPTY_BATCH_PAUSE).await;
                            } else {
                                self.process_batch(batch).await;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                subscription = %self.request_subscription,
                                error = %error,
                                "Request pull failed"
                            );
                            tokio::time::sleep(ERROR_PAUSE).await;
                        }
                    }
                }
            }
        }

        self.handle.set_state(ServiceState::Stopping);
        self.handle.set_state(ServiceState::Stopped);
    }

    async fn process_batch(&self, batch: Vec<ReceivedMessage>) {
        let mut ack_ids = Vec::with_capacity(batch.len());

        for received in batch {
            let ReceivedMessage { ack_id, message } = received;
            if self.process_message(message).await {
                ack_ids.push(ack_id);
            }
        }

        if let Err(error) = self
            .client
            .acknowledge(&self.request_subscription, &ack_ids)
            .await
        {
            tracing::warn!(
                subscription = %self.request_subscription,
                error = %error,
                "Failed to acknowledge requests"
            );
        }
    }

    /// Handles one message; returns whether it should be acknowledged.
    async fn process_message(&self, message: PubsubMessage) -> bool {
        let request: GenerateRequest = match serde_json::from_slice(&message.data) {
            Ok(request) => request,
            Err(error) => {
                // With a correlation attribute the caller is still
                // waiting; answer so it fails fast instead of timing
                // out. Without one there is nobody to tell.
                let Some(request_id) = message
                    .request_id_attribute()
                    .and_then(|raw| raw.parse::<RequestId>().ok())
                else {
                    tracing::warn!(
                        message_id = %message.message_id,
                        error = %error,
                        "Discarding uncorrelated undecodable request"
                    );
                    return true;
                };
                tracing::warn!(
                    %request_id,
                    message_id = %message.message_id,
                    error = %error,
                    "Rejecting undecodable request"
                );
                let reply =
                    DeckReply::failed(request_id, format!("invalid request payload: {error}"));
                return self.publish_reply(&reply).await.is_ok();
            }
        };

        let request_id = request.request_id;
        let reply = match self.pipeline.generate(&request).await {
            Ok(ready) => DeckReply::Ready(ready),
            Err(error) => {
                tracing::warn!(%request_id, error = %error, "Generation failed");
                DeckReply::failed(request_id, error.to_string())
            }
        };

        // Leave the request outstanding when the reply cannot be
        // published; redelivery retries the whole request.
        self.publish_reply(&reply).await.is_ok()
    }

    async fn publish_reply(&self, reply: &DeckReply) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;
        let mut attributes = BTreeMap::new();
        attributes.insert(
            REQUEST_ID_ATTRIBUTE.to_string(),
            reply.request_id().to_string(),
        );

        match self
            .client
            .publish(&self.reply_topic, &payload, &attributes)
            .await
        {
            Ok(message_id) => {
                tracing::debug!(
                    request_id = %reply.request_id(),
                    %message_id,
                    ready = reply.is_ready(),
                    "Published reply"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    request_id = %reply.request_id(),
                    error = %error,
                    "Failed to publish reply"
                );
                Err(error)
            }
        }
    }
}
