//! Slide layouts and the projection from payloads to concrete writes.

mod project;
mod schema;

pub use project::{project_slide, CellWrite, SectionWrite, SlideWrites};
pub use schema::{builtin_schemas, Band, BandSource, SectionBinding, SectionKind, SlideSchema};
