//! The reply published by the worker once generation has finished.

use super::ids::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Details of a successfully generated deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckReady {
    /// Correlation identifier copied from the request.
    pub request_id: RequestId,

    /// Shareable link to the uploaded deck.
    pub presentation_link: String,

    /// Identifier the storage backend assigned to the uploaded file.
    pub file_id: String,

    /// File name the deck was stored under.
    pub file_name: String,

    /// When generation completed.
    pub generated_at: DateTime<Utc>,
}

/// Outcome of a generation request, published to the reply topic.
///
/// Serialized with a `status` tag so that queue consumers can branch on
/// `"ready"` / `"failed"` without probing for fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeckReply {
    /// The deck was generated and uploaded.
    Ready(DeckReady),

    /// Generation failed; `error` carries the human-readable reason.
    Failed {
        /// Correlation identifier copied from the request.
        request_id: RequestId,
        /// Why generation failed.
        error: String,
    },
}

impl DeckReply {
    /// Creates a failure reply for the given request.
    pub fn failed<S: Into<String>>(request_id: RequestId, error: S) -> Self {
        DeckReply::Failed {
            request_id,
            error: error.into(),
        }
    }

    /// Returns the correlation identifier this reply answers.
    pub fn request_id(&self) -> RequestId {
        match self {
            DeckReply::Ready(ready) => ready.request_id,
            DeckReply::Failed { request_id, .. } => *request_id,
        }
    }

    /// Returns true if the deck was generated successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self, DeckReply::Ready(_))
    }
}
