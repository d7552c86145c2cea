//! The deck generation request exchanged between broker and worker.

use super::ids::RequestId;
use super::quarter::FiscalQuarter;
use serde::{Deserialize, Serialize};

/// A request to generate a quarterly review deck.
///
/// This is the JSON payload published to the generation topic. The
/// flattened [`FiscalQuarter`] keeps the wire shape identical to the
/// public API body (`quarter_no` / `year_no`), with the correlation id
/// and optional file name layered on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Correlation identifier echoed back on the reply.
    pub request_id: RequestId,

    /// Which quarter to build the deck for.
    #[serde(flatten)]
    pub quarter: FiscalQuarter,

    /// Optional caller-supplied name for the uploaded deck.
    ///
    /// When present the deck is stored as `{file_id}.pptx`, otherwise
    /// the quarter's default name is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl GenerateRequest {
    /// Creates a request for the given quarter with a fresh request id.
    pub fn new(quarter: FiscalQuarter) -> Self {
        Self {
            request_id: RequestId::new(),
            quarter,
            file_id: None,
        }
    }

    /// Sets the caller-supplied file identifier.
    pub fn with_file_id<S: Into<String>>(mut self, file_id: S) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// Returns the file name the finished deck should be stored under.
    pub fn deck_file_name(&self) -> String {
        match &self.file_id {
            Some(id) => format!("{id}.pptx"),
            None => self.quarter.deck_file_name(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quarter() -> FiscalQuarter {
        FiscalQuarter::new(3, 2025).unwrap()
    }

    #[test]
    fn test_new_assigns_unique_ids() {
        let a = GenerateRequest::new(quarter());
        let b = GenerateRequest::new(quarter());
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_wire_shape_is_flat() {
        let request = GenerateRequest::new(quarter()).with_file_id("board-review");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["quarter_no"], 3);
        assert_eq!(json["year_no"], 2025);
        assert_eq!(json["file_id"], "board-review");
        assert_eq!(json["request_id"], request.request_id.to_string());
        assert!(json.get("quarter").is_none(), "quarter must be flattened");
    }

    #[test]
    fn test_file_id_omitted_when_absent() {
        let request = GenerateRequest::new(quarter());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("file_id").is_none());
    }

    #[test]
    fn test_deserialization_roundtrip() {
        let request = GenerateRequest::new(quarter()).with_file_id("x");
        let json = serde_json::to_string(&request).unwrap();
        let back: GenerateRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_deck_file_name_prefers_file_id() {
        let named = GenerateRequest::new(quarter()).with_file_id("board-review");
        assert_eq!(named.deck_file_name(), "board-review.pptx");

        let default = GenerateRequest::new(quarter());
        assert_eq!(default.deck_file_name(), "Presentation_Q3_2025.pptx");
    }

    #[test]
    fn test_rejects_invalid_quarter_on_decode() {
        let raw = r#"{
            "request_id": "7f8d3a80-30c4-4bb1-b77a-0f25d0a0a7a4",
            "quarter_no": 7,
            "year_no": 2025
        }"#;
        assert!(serde_json::from_str::<GenerateRequest>(raw).is_err());
    }
}
