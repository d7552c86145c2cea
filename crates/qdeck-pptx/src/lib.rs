#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Deck rendering for quarterly review presentations.
//!
//! A deck template is a `.pptx` archive whose review slides carry one
//! metrics table each, plus named shapes for bullet sections. This
//! crate opens the archive, patches the affected slide parts in place
//! and writes the archive back. Only targeted text runs change; fonts,
//! fills and cell geometry all come from the template.

mod archive;
mod renderer;
mod slide;

pub use archive::{DeckArchive, slide_part};
pub use renderer::DeckRenderer;
