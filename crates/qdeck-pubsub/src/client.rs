//! Minimal Pub/Sub REST client.
//!
//! Speaks to `https://pubsub.googleapis.com/v1` directly with a bearer
//! token from [`qdeck_gcp_auth::TokenProvider`]; no SDK crate involved.
//! The base URL can be pointed at a local emulator or a test server.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use qdeck_core::{Error, Result};
use qdeck_gcp_auth::TokenProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Production Pub/Sub endpoint.
const DEFAULT_BASE_URL: &str = "https://pubsub.googleapis.com";

/// Attribute carrying the correlation id on request and reply messages.
pub const REQUEST_ID_ATTRIBUTE: &str = "request_id";

/// A message pulled from a subscription, ready to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Opaque token used to acknowledge this delivery.
    pub ack_id: String,

    /// The message itself.
    pub message: PubsubMessage,
}

/// A Pub/Sub message with its payload already base64-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubsubMessage {
    /// Decoded payload bytes.
    pub data: Vec<u8>,

    /// Message attributes.
    pub attributes: BTreeMap<String, String>,

    /// Server-assigned message id.
    pub message_id: String,
}

impl PubsubMessage {
    /// Returns the correlation id attribute, if the message carries one.
    pub fn request_id_attribute(&self) -> Option<&str> {
        self.attributes.get(REQUEST_ID_ATTRIBUTE).map(String::as_str)
    }
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    messages: Vec<OutgoingMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    data: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullBody {
    max_messages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    message_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeBody<'a> {
    ack_ids: &'a [String],
}

/// Client for one project's topics and subscriptions.
#[derive(Clone)]
pub struct PubsubClient {
    http_client: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
    base_url: String,
    project_id: String,
}

impl PubsubClient {
    /// Creates a client for the given project.
    pub fn new<S: Into<String>>(project_id: S, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token_provider,
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
        }
    }

    /// Overrides the API endpoint, for emulators and tests.
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the project this client addresses.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn topic_url(&self, topic: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/topics/{topic}:{verb}",
            self.base_url, self.project_id
        )
    }

    fn subscription_url(&self, subscription: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/subscriptions/{subscription}:{verb}",
            self.base_url, self.project_id
        )
    }

    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        what: &str,
    ) -> Result<reqwest::Response> {
        let token = self.token_provider.token().await?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::queue_with_source(format!("{what} request failed"), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::queue(format!(
                "{what} failed (HTTP {status}): {body}"
            )));
        }
        Ok(response)
    }

    /// Publishes one message and returns its server-assigned id.
    pub async fn publish(
        &self,
        topic: &str,
        data: &[u8],
        attributes: &BTreeMap<String, String>,
    ) -> Result<String> {
        let body = PublishBody {
            messages: vec![OutgoingMessage {
                data: BASE64.encode(data),
                attributes,
            }],
        };

        let response = self
            .post_json(&self.topic_url(topic, "publish"), &body, "publish")
            .await?;
        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| Error::queue_with_source("publish response parse failed", e))?;

        let message_id = parsed.message_ids.into_iter().next().unwrap_or_default();
        tracing::debug!(topic = %topic, message_id = %message_id, "Published message");
        Ok(message_id)
    }

    /// Pulls up to `max_messages` messages from a subscription.
    ///
    /// Returns an empty batch when the subscription has nothing to
    /// deliver; messages stay outstanding until acknowledged.
    pub async fn pull(&self, subscription: &str, max_messages: u32) -> Result<Vec<ReceivedMessage>> {
        let body = PullBody { max_messages };
        let response = self
            .post_json(&self.subscription_url(subscription, "pull"), &body, "pull")
            .await?;
        let parsed: PullResponse = response
            .json()
            .await
            .map_err(|e| Error::queue_with_source("pull response parse failed", e))?;

        parsed
            .received_messages
            .into_iter()
            .map(|received| {
                let data = match received.message.data {
                    Some(encoded) => BASE64
                        .decode(encoded)
                        .map_err(|e| Error::queue_with_source("message payload is not base64", e))?,
                    None => Vec::new(),
                };
                Ok(ReceivedMessage {
                    ack_id: received.ack_id,
                    message: PubsubMessage {
                        data,
                        attributes: received.message.attributes,
                        message_id: received.message.message_id,
                    },
                })
            })
            .collect()
    }

    /// Acknowledges delivered messages. No-op for an empty batch.
    pub async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let body = AcknowledgeBody { ack_ids };
        self.post_json(
            &self.subscription_url(subscription, "acknowledge"),
            &body,
            "acknowledge",
        )
        .await?;
        Ok(())
    }
}
