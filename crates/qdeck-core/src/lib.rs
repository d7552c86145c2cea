#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Quarterdeck Core Library
//!
//! Core types, traits, and slide layouts for the Quarterdeck deck
//! generation services.

pub mod error;
pub mod layout;
pub mod metrics;
pub mod service;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use error::{Error, Result};
pub use metrics::{InsightsReport, MetricValue, RegionMetrics, SlidePayload, SlideTables};
pub use traits::{
    DeckRelay, DeckSink, InsightsSource, MockDeckRelay, MockDeckSink, MockInsightsSource,
    StoredDeck,
};
pub use types::{DeckReady, DeckReply, FiscalQuarter, GenerateRequest, RequestId};
