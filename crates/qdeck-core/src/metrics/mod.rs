//! Metric values and the per-slide report returned by the insights API.

mod report;
mod value;

pub use report::{InsightsReport, RegionMetrics, SlidePayload, SlideTables};
pub use value::MetricValue;
