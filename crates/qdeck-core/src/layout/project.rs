//! Projection of an insights payload onto a slide's fixed layout.

use super::schema::{BandSource, SectionKind, SlideSchema};
use crate::metrics::SlidePayload;

/// A single cell overwrite, addressed by zero-based row and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    /// Zero-based table row.
    pub row: usize,

    /// Zero-based table column.
    pub col: usize,

    /// Replacement text; empty blanks the cell.
    pub text: String,
}

/// Replacement bullet lines for one named text shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionWrite {
    /// Name of the shape to rewrite.
    pub shape_name: String,

    /// Bullet lines, one paragraph each.
    pub lines: Vec<String>,
}

/// Every write the renderer must apply to one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideWrites {
    /// Slide number within the deck.
    pub slide_no: u32,

    /// Table cell overwrites.
    pub cells: Vec<CellWrite>,

    /// Named shape rewrites.
    pub sections: Vec<SectionWrite>,
}

impl SlideWrites {
    /// Returns true if the slide needs no changes.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.sections.is_empty()
    }
}

/// Projects one slide's payload onto its fixed layout.
///
/// Every schema cell is always emitted: a metric the payload does not
/// cover produces an empty write, which blanks whatever placeholder
/// text the template ships with. Narrative sections are only emitted
/// when the payload carries lines for them.
pub fn project_slide(schema: &SlideSchema, payload: &SlidePayload) -> SlideWrites {
    let stride = if schema.with_yoy { 2 } else { 1 };
    let mut cells = Vec::new();

    for band in &schema.bands {
        let metrics = match &band.source {
            BandSource::Regional => payload.tables.regional(),
            BandSource::Product(scope) => payload.tables.scoped(scope),
        };

        for (i, metric) in schema.metrics.iter().enumerate() {
            let row = band.start_row + i;
            for (j, region) in schema.regions.iter().enumerate() {
                let value = metrics
                    .and_then(|band| band.get(region, metric))
                    .cloned()
                    .unwrap_or_default();
                let col = schema.first_col + j * stride;

                cells.push(CellWrite {
                    row,
                    col,
                    text: value.qtd_attain(),
                });
                if schema.with_yoy {
                    cells.push(CellWrite {
                        row,
                        col: col + 1,
                        text: value.yoy,
                    });
                }
            }
        }
    }

    let sections = schema
        .sections
        .iter()
        .filter_map(|binding| {
            let lines = match binding.kind {
                SectionKind::Insights => &payload.insights,
                SectionKind::Recommendations => &payload.recommendations,
                SectionKind::Drivers => &payload.drivers,
            };
            if lines.is_empty() {
                None
            } else {
                Some(SectionWrite {
                    shape_name: binding.shape_name.clone(),
                    lines: lines.clone(),
                })
            }
        })
        .collect();

    SlideWrites {
        slide_no: schema.slide_no,
        cells,
        sections,
    }
}
