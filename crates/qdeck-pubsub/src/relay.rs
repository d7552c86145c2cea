//! Queue-backed implementation of the request/reply round trip.

use crate::client::{PubsubClient, REQUEST_ID_ATTRIBUTE};
use crate::router::ReplyRouter;
use async_trait::async_trait;
use qdeck_core::{DeckRelay, DeckReply, Error, GenerateRequest, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Publishes generation requests and waits for the correlated reply.
///
/// Waiting happens entirely in process: the shared [`ReplyListener`]
/// pulls the reply subscription and this relay just parks on the
/// router's oneshot channel for its request id.
///
/// [`ReplyListener`]: crate::ReplyListener
pub struct PubsubDeckRelay {
    client: Arc<PubsubClient>,
    topic: String,
    router: Arc<ReplyRouter>,
}

impl PubsubDeckRelay {
    /// Creates a relay publishing to `topic` and waiting on `router`.
    pub fn new(client: Arc<PubsubClient>, topic: impl Into<String>, router: Arc<ReplyRouter>) -> Self {
        Self {
            client,
            topic: topic.into(),
            router,
        }
    }
}

#[async_trait]
impl DeckRelay for PubsubDeckRelay {
    async fn relay(&self, request: GenerateRequest, timeout: Duration) -> Result<DeckReply> {
        let request_id = request.request_id;
        let payload = serde_json::to_vec(&request)?;

        let mut attributes = BTreeMap::new();
        attributes.insert(REQUEST_ID_ATTRIBUTE.to_string(), request_id.to_string());

        let rx = self.router.register(request_id);
        if let Err(error) = self.client.publish(&self.topic, &payload, &attributes).await {
            self.router.forget(request_id);
            return Err(error);
        }

        tracing::info!(
            request_id = %request_id,
            topic = %self.topic,
            timeout_secs = timeout.as_secs(),
            "Relayed generation request, waiting for reply"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.router.forget(request_id);
                Err(Error::queue("reply channel closed before a reply arrived"))
            }
            Err(_) => {
                self.router.forget(request_id);
                tracing::warn!(
                    request_id = %request_id,
                    timeout_secs = timeout.as_secs(),
                    "Timed out waiting for generation reply"
                );
                Err(Error::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}
