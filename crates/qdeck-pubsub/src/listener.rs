//! Background listener on the shared reply subscription.

use crate::client::{PubsubClient, ReceivedMessage};
use crate::router::ReplyRouter;
use qdeck_core::service::{ServiceHandle, ServiceState};
use qdeck_core::DeckReply;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Messages fetched per pull.
const PULL_BATCH_SIZE: u32 = 50;

/// Pause after an empty batch; emulators answer empty pulls immediately.
const EMPTY_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Pause after a pull error before trying again.
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// The single per-process consumer of the reply subscription.
///
/// Every pulled message is acknowledged, whether or not a waiter was
/// found: replies whose caller already timed out are stale and must not
/// be redelivered to the next pull.
pub struct ReplyListener {
    client: Arc<PubsubClient>,
    subscription: String,
    router: Arc<ReplyRouter>,
    handle: ServiceHandle,
}

impl ReplyListener {
    /// Creates a listener on `subscription` feeding `router`.
    pub fn new(
        client: Arc<PubsubClient>,
        subscription: impl Into<String>,
        router: Arc<ReplyRouter>,
    ) -> Self {
        Self {
            client,
            subscription: subscription.into(),
            router,
            handle: ServiceHandle::new("reply-listener"),
        }
    }

    /// Returns a handle observing this listener's lifecycle.
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Pulls and routes replies until `shutdown` flips to `true`.
    ///
    /// The handle reaches [`ServiceState::Ready`] after the first
    /// successful pull, so startup code can wait for the subscription
    /// to be reachable before serving requests.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        self.handle.set_state(ServiceState::Starting);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                batch = self.client.pull(&self.subscription, PULL_BATCH_SIZE) => {
                    match batch {
                        Ok(batch) => {
                            if !self.handle.state().is_ready() {
                                self.handle.set_state(ServiceState::Ready);
                            }
                            if batch.is_empty() {
                                tokio::time::sleep(EMPTY_BATCH_PAUSE).await;
                            } else {
                                self.dispatch(batch).await;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                subscription = %self.subscription,
                                error = %error,
                                "Reply pull failed"
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

    async fn dispatch(&self, batch: Vec<ReceivedMessage>) {
        let mut ack_ids = Vec::with_capacity(batch.len());

        for received in batch {
            let ReceivedMessage { ack_id, message } = received;
            ack_ids.push(ack_id);

            match serde_json::from_slice::<DeckReply>(&message.data) {
                Ok(reply) => {
                    let request_id = reply.request_id();
                    if self.router.route(reply) {
                        tracing::debug!(request_id = %request_id, "Delivered reply to waiter");
                    } else {
                        tracing::debug!(request_id = %request_id, "No waiter for reply, dropping");
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        message_id = %message.message_id,
                        request_id = message.request_id_attribute().unwrap_or("<missing>"),
                        error = %error,
                        "Discarding undecodable reply"
                    );
                }
            }
        }

        if let Err(error) = self
            .client
            .acknowledge(&self.subscription, &ack_ids)
            .await
        {
            tracing::warn!(
                subscription = %self.subscription,
                error = %error,
                "Failed to acknowledge replies"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use qdeck_core::{DeckReady, RequestId};
    use qdeck_gcp_auth::StaticTokenProvider;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> Arc<PubsubClient> {
        Arc::new(
            PubsubClient::new(
                "example-project",
                Arc::new(StaticTokenProvider::new("test-token")),
            )
            .with_base_url(server.uri()),
        )
    }

    fn reply_body(reply: &DeckReply) -> serde_json::Value {
        serde_json::json!({
            "receivedMessages": [{
                "ackId": "ack-1",
                "message": {
                    "data": BASE64.encode(serde_json::to_vec(reply).unwrap()),
                    "attributes": {"request_id": reply.request_id().to_string()},
                    "messageId": "m-1"
                }
            }]
        })
    }

    async fn mount_empty_pull(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path_regex(r":pull$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(server)
            .await;
    }

    async fn mount_ack(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path_regex(r":acknowledge$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_listener_routes_reply_to_waiter() {
        let server = MockServer::start().await;
        let request_id = RequestId::new();
        let reply = DeckReply::Ready(DeckReady {
            request_id,
            presentation_link: "https://drive.google.com/file/d/f1/view".to_string(),
            file_id: "f1".to_string(),
            file_name: "Presentation_Q3_2025.pptx".to_string(),
            generated_at: chrono::Utc::now(),
        });

        Mock::given(method("POST"))
            .and(path_regex(r":pull$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body(&reply)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_empty_pull(&server).await;
        mount_ack(&server, 1).await;

        let router = Arc::new(ReplyRouter::new());
        let rx = router.register(request_id);

        let listener = ReplyListener::new(test_client(&server), "deck-replies", router);
        let handle = listener.handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(listener.run(shutdown_rx));

        let received = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, reply);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(handle.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_listener_acks_unmatched_and_undecodable_replies() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(r":pull$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "receivedMessages": [
                    {
                        "ackId": "ack-unmatched",
                        "message": {
                            "data": BASE64.encode(
                                serde_json::to_vec(&DeckReply::failed(RequestId::new(), "late"))
                                    .unwrap()
                            ),
                            "messageId": "m-1"
                        }
                    },
                    {
                        "ackId": "ack-garbage",
                        "message": {
                            "data": BASE64.encode(b"not json"),
                            "messageId": "m-2"
                        }
                    }
                ]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_empty_pull(&server).await;
        mount_ack(&server, 1).await;

        let router = Arc::new(ReplyRouter::new());
        let waiting_id = RequestId::new();
        let mut rx = router.register(waiting_id);

        let listener = ReplyListener::new(test_client(&server), "deck-replies", router.clone());
        let handle = listener.handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(listener.run(shutdown_rx));

        handle.wait_ready(Duration::from_secs(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // The unrelated waiter is untouched and still registered.
        assert!(rx.try_recv().is_err());
        assert_eq!(router.pending(), 1);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_not_ready_while_pull_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let listener = ReplyListener::new(
            test_client(&server),
            "deck-replies",
            Arc::new(ReplyRouter::new()),
        );
        let handle = listener.handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(listener.run(shutdown_rx));

        assert!(handle.wait_ready(Duration::from_millis(300)).await.is_err());

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
