//! Seams for the insights API and the deck storage backend.
//!
//! The worker pipeline is written against these traits so that tests
//! can swap the HTTP insights client and the cloud upload for the mocks
//! defined here. The mocks are exported from the library (not gated on
//! `cfg(test)`) so downstream crates' tests can reuse them.

use crate::error::{Error, Result};
use crate::metrics::InsightsReport;
use crate::types::{DeckReady, DeckReply, FiscalQuarter, GenerateRequest};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Provides the per-slide metrics report for a quarter.
#[async_trait]
pub trait InsightsSource: Send + Sync {
    /// Fetches the insights report covering the given quarter.
    async fn fetch(&self, quarter: FiscalQuarter) -> Result<InsightsReport>;
}

/// Where an uploaded deck ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDeck {
    /// Identifier the backend assigned to the stored file.
    pub file_id: String,

    /// Shareable link to the stored file.
    pub link: String,
}

/// Stores a finished deck and returns where it can be reached.
#[async_trait]
pub trait DeckSink: Send + Sync {
    /// Stores `deck` under `file_name` and returns its id and link.
    async fn store(&self, file_name: &str, deck: Vec<u8>) -> Result<StoredDeck>;
}

/// Relays a generation request to the worker fleet and awaits its reply.
///
/// The public API is written against this seam; the queue-backed
/// implementation publishes the request and waits on the shared reply
/// topic for a message carrying the same request id.
#[async_trait]
pub trait DeckRelay: Send + Sync {
    /// Sends `request` and waits up to `timeout` for the matching reply.
    ///
    /// Returns [`Error::Timeout`] when no reply arrives in time.
    async fn relay(&self, request: GenerateRequest, timeout: Duration) -> Result<DeckReply>;
}

/// Mock insights source returning a canned report.
///
/// Records every requested quarter so tests can assert on call counts
/// and arguments.
pub struct MockInsightsSource {
    report: InsightsReport,
    error: Option<String>,
    requests: Mutex<Vec<FiscalQuarter>>,
}

impl MockInsightsSource {
    /// Creates a mock that answers every fetch with `report`.
    pub fn new(report: InsightsReport) -> Self {
        Self {
            report,
            error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that fails every fetch with an insights error.
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            report: InsightsReport::default(),
            error: Some(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the quarters that have been fetched so far.
    pub fn requests(&self) -> Vec<FiscalQuarter> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InsightsSource for MockInsightsSource {
    async fn fetch(&self, quarter: FiscalQuarter) -> Result<InsightsReport> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(quarter);
        match &self.error {
            Some(message) => Err(Error::insights(message.clone())),
            None => Ok(self.report.clone()),
        }
    }
}

/// One deck captured by [`MockDeckSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// File name the deck was stored under.
    pub file_name: String,

    /// The uploaded bytes.
    pub bytes: Vec<u8>,
}

/// Mock deck sink that keeps uploads in memory.
pub struct MockDeckSink {
    error: Option<String>,
    uploads: Mutex<Vec<StoredUpload>>,
}

impl MockDeckSink {
    /// Creates a mock that accepts every upload.
    pub fn new() -> Self {
        Self {
            error: None,
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that fails every upload with an upload error.
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            error: Some(message.into()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Returns the decks stored so far.
    pub fn uploads(&self) -> Vec<StoredUpload> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockDeckSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeckSink for MockDeckSink {
    async fn store(&self, file_name: &str, deck: Vec<u8>) -> Result<StoredDeck> {
        if let Some(message) = &self.error {
            return Err(Error::upload(message.clone()));
        }
        let mut uploads = self.uploads.lock().unwrap_or_else(PoisonError::into_inner);
        uploads.push(StoredUpload {
            file_name: file_name.to_string(),
            bytes: deck,
        });
        let file_id = format!("deck-{}", uploads.len());
        Ok(StoredDeck {
            link: format!("https://decks.example.com/{file_id}/view"),
            file_id,
        })
    }
}

enum RelayMode {
    Ready,
    Failed(String),
    TimingOut,
}

/// Mock relay that answers without a queue.
///
/// Records every relayed request so tests can assert on what the API
/// layer actually sent.
pub struct MockDeckRelay {
    mode: RelayMode,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockDeckRelay {
    /// Creates a mock that answers every request with a ready deck.
    pub fn ready() -> Self {
        Self {
            mode: RelayMode::Ready,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock whose worker reports a failed generation.
    pub fn failed<S: Into<String>>(error: S) -> Self {
        Self {
            mode: RelayMode::Failed(error.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that never answers within the timeout.
    pub fn timing_out() -> Self {
        Self {
            mode: RelayMode::TimingOut,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the requests relayed so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DeckRelay for MockDeckRelay {
    async fn relay(&self, request: GenerateRequest, timeout: Duration) -> Result<DeckReply> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match &self.mode {
            RelayMode::Ready => Ok(DeckReply::Ready(DeckReady {
                request_id: request.request_id,
                presentation_link: "https://decks.example.com/deck-1/view".to_string(),
                file_id: "deck-1".to_string(),
                file_name: request.deck_file_name(),
                generated_at: chrono::Utc::now(),
            })),
            RelayMode::Failed(error) => Ok(DeckReply::failed(request.request_id, error.clone())),
            RelayMode::TimingOut => Err(Error::Timeout {
                seconds: timeout.as_secs(),
            }),
        }
    }
}
