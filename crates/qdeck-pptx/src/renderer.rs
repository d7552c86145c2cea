//! Fills a deck template from a quarter's insights report.

use crate::archive::{DeckArchive, slide_part};
use crate::slide::rewrite_slide;
use qdeck_core::layout::{SlideSchema, builtin_schemas, project_slide};
use qdeck_core::metrics::InsightsReport;
use qdeck_core::{Error, Result};

/// Renders decks by patching slide markup inside a template archive.
///
/// The template itself is passed per call, so one renderer can serve
/// many requests concurrently.
#[derive(Debug, Clone)]
pub struct DeckRenderer {
    schemas: Vec<SlideSchema>,
}

impl Default for DeckRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckRenderer {
    /// A renderer for the built-in quarterly review layout.
    pub fn new() -> Self {
        Self {
            schemas: builtin_schemas(),
        }
    }

    /// A renderer with a custom slide layout.
    pub fn with_schemas(schemas: Vec<SlideSchema>) -> Self {
        Self { schemas }
    }

    /// Produces a filled copy of `template` from `report`.
    ///
    /// Slides the layout knows but the report omits are left as they
    /// are in the template; report slides with no layout are ignored
    /// with a warning. Entries the layout never touches are copied
    /// byte-for-byte.
    pub fn render(&self, template: &[u8], report: &InsightsReport) -> Result<Vec<u8>> {
        let mut archive = DeckArchive::open(template)?;

        for schema in &self.schemas {
            let Some(payload) = report.slide(schema.slide_no) else {
                tracing::debug!(slide_no = schema.slide_no, "No payload for slide, skipping");
                continue;
            };
            let writes = project_slide(schema, payload);
            if writes.is_empty() {
                tracing::debug!(slide_no = schema.slide_no, "Slide payload is empty, skipping");
                continue;
            }

            let part = slide_part(schema.slide_no);
            let Some(xml) = archive.read(&part) else {
                return Err(Error::render(format!(
                    "template has no slide {}",
                    schema.slide_no
                )));
            };
            let rewritten = rewrite_slide(schema.slide_no, xml, &writes)?;
            archive.replace(&part, rewritten)?;
            tracing::debug!(
                slide_no = schema.slide_no,
                cells = writes.cells.len(),
                sections = writes.sections.len(),
                "Populated slide"
            );
        }

        for (slide_no, _) in report.slides() {
            if !self.schemas.iter().any(|s| s.slide_no == slide_no) {
                tracing::warn!(slide_no, "Report carries a slide with no layout, ignoring");
            }
        }

        archive.into_bytes()
    }
}
