//! Fixed layouts of the slides the deck template supports.
//!
//! The review template's tables never move: each supported slide has a
//! known set of row labels (metrics), column labels (regions), and a
//! known first data row. A [`SlideSchema`] captures that layout so the
//! projection can turn an insights payload into absolute cell writes
//! without ever parsing the table's label cells.

/// Where a table band draws its metrics from in the slide payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandSource {
    /// The slide's single region-keyed table.
    Regional,

    /// One product family of a product-scoped payload, e.g. `"GCP"`.
    Product(String),
}

/// One contiguous run of metric rows within a slide's table.
///
/// Slides with a single table have one band; the portfolio summary
/// stacks a GCP band and a GWS band in the same table at different
/// starting rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    /// Which part of the payload fills this band.
    pub source: BandSource,

    /// Zero-based row of the band's first metric.
    pub start_row: usize,
}

/// Narrative sections a slide can carry outside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Key insight bullets.
    Insights,
    /// Recommendation bullets.
    Recommendations,
    /// Win/loss driver bullets.
    Drivers,
}

/// Binds a narrative section to a named text shape on the slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBinding {
    /// Which payload section fills the shape.
    pub kind: SectionKind,

    /// The shape's name in the slide markup.
    pub shape_name: String,
}

/// The fixed layout of one supported slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideSchema {
    /// Slide number within the deck (and key into the insights report).
    pub slide_no: u32,

    /// Region column labels, in template column order.
    pub regions: Vec<String>,

    /// Metric row labels, in template row order.
    pub metrics: Vec<String>,

    /// Metric bands stacked in the slide's table.
    pub bands: Vec<Band>,

    /// Zero-based column of the first region; column 0 holds row labels.
    pub first_col: usize,

    /// Whether each region spans two columns, value then year-over-year.
    pub with_yoy: bool,

    /// Text shapes filled from the payload's narrative sections.
    pub sections: Vec<SectionBinding>,
}

impl SlideSchema {
    /// Creates a schema with no bands, ready for the `with_*` builders.
    pub fn new(slide_no: u32, regions: &[&str], metrics: &[&str]) -> Self {
        Self {
            slide_no,
            regions: regions.iter().map(|r| r.to_string()).collect(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            bands: Vec::new(),
            first_col: 1,
            with_yoy: false,
            sections: Vec::new(),
        }
    }

    /// Adds a band filled from the payload's single regional table.
    pub fn with_regional_band(mut self, start_row: usize) -> Self {
        self.bands.push(Band {
            source: BandSource::Regional,
            start_row,
        });
        self
    }

    /// Adds a band filled from one product family of a scoped payload.
    pub fn with_product_band<S: Into<String>>(mut self, scope: S, start_row: usize) -> Self {
        self.bands.push(Band {
            source: BandSource::Product(scope.into()),
            start_row,
        });
        self
    }

    /// Gives every region a second column carrying year-over-year change.
    pub fn with_yoy_columns(mut self) -> Self {
        self.with_yoy = true;
        self
    }

    /// Binds a narrative section to a named shape on the slide.
    pub fn with_section<S: Into<String>>(mut self, kind: SectionKind, shape_name: S) -> Self {
        self.sections.push(SectionBinding {
            kind,
            shape_name: shape_name.into(),
        });
        self
    }
}

/// Regions on the portfolio summary slide, in column order.
const SUMMARY_REGIONS: [&str; 4] = ["NORTHAM", "EMEA", "JAPAC", "LATAM"];

/// Regions on the per-segment review slides, in column order.
const REVIEW_REGIONS: [&str; 6] = [
    "NORTHAM",
    "LATAM",
    "EMEA",
    "JAPAC",
    "PUBLIC SECTOR",
    "GLOBAL",
];

/// Returns the layouts of every slide the bundled template supports.
pub fn builtin_schemas() -> Vec<SlideSchema> {
    vec![
        // Slide 11: portfolio summary with stacked GCP and GWS bands.
        SlideSchema::new(
            11,
            &SUMMARY_REGIONS,
            &[
                "Ent+Corp Pipeline",
                "SMB Pipeline",
                "Total Partner Marketing Sourced",
            ],
        )
        .with_product_band("GCP", 3)
        .with_product_band("GWS", 7),
        // Slide 14: full GCP business review.
        SlideSchema::new(
            14,
            &REVIEW_REGIONS,
            &[
                "Direct Named QSOs",
                "Direct Named Pipeline",
                "Startup QSOs",
                "Startup Pipeline",
                "SMB QSOs",
                "SMB Pipeline",
                "Partner Pipeline",
                "GCP Direct QSOs",
                "GCP Direct + Partner Pipe",
            ],
        )
        .with_regional_band(3)
        .with_yoy_columns(),
        // Slide 15: GCP named-accounts review.
        SlideSchema::new(
            15,
            &REVIEW_REGIONS,
            &[
                "Direct Named QSOs",
                "Direct Named Pipeline",
                "Partner Pipeline",
                "GCP Direct QSOs",
                "GCP Direct + Partner Pipe",
            ],
        )
        .with_regional_band(3)
        .with_yoy_columns(),
        // Slide 16: Workspace review.
        SlideSchema::new(
            16,
            &REVIEW_REGIONS,
            &[
                "Direct Named QSOs",
                "Direct Named Pipeline",
                "Partner Pipeline",
                "GWS QSOs",
                "GWS Direct + Partner Pipe",
            ],
        )
        .with_regional_band(3)
        .with_yoy_columns(),
        // Slide 17: Workspace review with narrative callouts.
        SlideSchema::new(
            17,
            &REVIEW_REGIONS,
            &[
                "Direct Named QSOs",
                "Direct Named Pipeline",
                "Partner Pipeline",
                "GWS QSOs",
                "GWS Direct + Partner Pipe",
            ],
        )
        .with_regional_band(3)
        .with_yoy_columns()
        .with_section(SectionKind::Insights, "Insights")
        .with_section(SectionKind::Recommendations, "Recommendations")
        .with_section(SectionKind::Drivers, "Drivers"),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_slide_numbers() {
        let slides: Vec<u32> = builtin_schemas().iter().map(|s| s.slide_no).collect();
        assert_eq!(slides, vec![11, 14, 15, 16, 17]);
    }

    #[test]
    fn test_summary_slide_has_stacked_product_bands() {
        let schemas = builtin_schemas();
        let summary = schemas.iter().find(|s| s.slide_no == 11).unwrap();

        assert_eq!(summary.bands.len(), 2);
        assert_eq!(summary.bands[0].source, BandSource::Product("GCP".to_string()));
        assert_eq!(summary.bands[0].start_row, 3);
        assert_eq!(summary.bands[1].source, BandSource::Product("GWS".to_string()));
        assert_eq!(summary.bands[1].start_row, 7);
        assert!(!summary.with_yoy);
        assert_eq!(summary.regions.len(), 4);
    }

    #[test]
    fn test_review_slides_have_yoy_columns() {
        for schema in builtin_schemas() {
            if schema.slide_no == 11 {
                continue;
            }
            assert!(schema.with_yoy, "slide {} should carry YoY", schema.slide_no);
            assert_eq!(schema.regions.len(), 6);
            assert_eq!(schema.bands, vec![Band {
                source: BandSource::Regional,
                start_row: 3,
            }]);
        }
    }

    #[test]
    fn test_full_review_slide_metric_count() {
        let schemas = builtin_schemas();
        let full = schemas.iter().find(|s| s.slide_no == 14).unwrap();
        assert_eq!(full.metrics.len(), 9);
    }

    #[test]
    fn test_narrative_slide_sections() {
        let schemas = builtin_schemas();
        let narrative = schemas.iter().find(|s| s.slide_no == 17).unwrap();

        let kinds: Vec<SectionKind> = narrative.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Insights,
                SectionKind::Recommendations,
                SectionKind::Drivers
            ]
        );
        assert!(schemas
            .iter()
            .filter(|s| s.slide_no != 17)
            .all(|s| s.sections.is_empty()));
    }
}
