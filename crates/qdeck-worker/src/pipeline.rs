//! The fetch, render, upload sequence for one request.

use chrono::Utc;
use qdeck_core::{DeckReady, DeckSink, GenerateRequest, InsightsSource, Result};
use qdeck_pptx::DeckRenderer;
use std::sync::Arc;

/// Turns one generation request into an uploaded deck.
///
/// The template bytes are loaded once at startup and shared; each run
/// renders a fresh copy, so requests can be processed concurrently.
pub struct DeckPipeline {
    insights: Arc<dyn InsightsSource>,
    renderer: DeckRenderer,
    template: Vec<u8>,
    sink: Arc<dyn DeckSink>,
}

impl DeckPipeline {
    /// Creates a pipeline over the given seams and template.
    pub fn new(
        insights: Arc<dyn InsightsSource>,
        renderer: DeckRenderer,
        template: Vec<u8>,
        sink: Arc<dyn DeckSink>,
    ) -> Self {
        Self {
            insights,
            renderer,
            template,
            sink,
        }
    }

    /// Generates, uploads, and describes the deck for `request`.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<DeckReady> {
        let request_id = request.request_id;
        tracing::info!(%request_id, quarter = %request.quarter, "Generating deck");

        let report = self.insights.fetch(request.quarter).await?;
        tracing::debug!(%request_id, slides = report.len(), "Fetched insights report");

        let deck = self.renderer.render(&self.template, &report)?;

        let file_name = request.deck_file_name();
        let stored = self.sink.store(&file_name, deck).await?;
        tracing::info!(%request_id, file_id = %stored.file_id, "Deck stored");

        Ok(DeckReady {
            request_id,
            presentation_link: stored.link,
            file_id: stored.file_id,
            file_name,
            generated_at: Utc::now(),
        })
    }
}
