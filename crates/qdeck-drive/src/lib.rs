#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Storage backends for finished decks.
//!
//! [`DriveClient`] uploads to Google Drive over the `files` REST
//! surface with a bearer token from [`qdeck_gcp_auth::TokenProvider`];
//! no SDK crate involved. [`FileSink`] writes decks to a local
//! directory instead, for one-shot runs without cloud credentials.

use async_trait::async_trait;
use qdeck_core::{DeckSink, Error, Result, StoredDeck};
use qdeck_gcp_auth::TokenProvider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Production Drive endpoint.
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// MIME type of a PowerPoint deck.
pub const DECK_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Debug, Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<[&'a str; 1]>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Returns the shareable viewer link for a Drive file id.
pub fn share_link(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/view")
}

/// Uploads decks to Google Drive.
///
/// Uses the multipart upload surface so metadata and content land in
/// one request. The base URL can be pointed at a test server.
#[derive(Clone)]
pub struct DriveClient {
    http_client: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
    base_url: String,
    folder_id: Option<String>,
}

impl DriveClient {
    /// Creates a client uploading to the caller's Drive root.
    pub fn new(token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token_provider,
            base_url: DEFAULT_BASE_URL.to_string(),
            folder_id: None,
        }
    }

    /// Overrides the API endpoint, for tests.
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Uploads into the given folder instead of the Drive root.
    pub fn with_folder<S: Into<String>>(mut self, folder_id: S) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    /// Builds the `multipart/related` body Drive expects: a JSON
    /// metadata part followed by the deck bytes.
    fn multipart_body(&self, boundary: &str, file_name: &str, deck: &[u8]) -> Result<Vec<u8>> {
        let metadata = FileMetadata {
            name: file_name,
            parents: self.folder_id.as_deref().map(|id| [id]),
        };
        let metadata = serde_json::to_vec(&metadata)
            .map_err(|e| Error::upload_with_source("file metadata encode failed", e))?;

        let mut body = Vec::with_capacity(deck.len() + metadata.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(&metadata);
        body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {DECK_MIME_TYPE}\r\n\r\n").as_bytes());
        body.extend_from_slice(deck);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Ok(body)
    }
}

#[async_trait]
impl DeckSink for DriveClient {
    async fn store(&self, file_name: &str, deck: Vec<u8>) -> Result<StoredDeck> {
        let token = self.token_provider.token().await?;
        let boundary = format!("deck-{}", uuid::Uuid::new_v4());
        let body = self.multipart_body(&boundary, file_name, &deck)?;

        let url = format!(
            "{}/upload/drive/v3/files?uploadType=multipart&fields=id",
            self.base_url
        );
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header(
                "content-type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| Error::upload_with_source("upload request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upload(format!(
                "upload failed (HTTP {status}): {body}"
            )));
        }
        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| Error::upload_with_source("upload response parse failed", e))?;

        tracing::info!(file_name = %file_name, file_id = %parsed.id, "Uploaded deck");
        Ok(StoredDeck {
            link: share_link(&parsed.id),
            file_id: parsed.id,
        })
    }
}

/// Writes decks to a local directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    /// Creates a sink writing into `directory`, creating it on demand.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl DeckSink for FileSink {
    async fn store(&self, file_name: &str, deck: Vec<u8>) -> Result<StoredDeck> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(file_name);
        tokio::fs::write(&path, deck).await?;

        tracing::info!(path = %path.display(), "Wrote deck");
        Ok(StoredDeck {
            file_id: file_name.to_string(),
            link: path.display().to_string(),
        })
    }
}
