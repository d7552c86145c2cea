#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! The deck generation worker.
//!
//! Consumes generation requests from a Pub/Sub subscription, runs each
//! one through the fetch/render/upload pipeline, and publishes the
//! outcome to the reply topic the broker listens on:
//!
//! - [`DeckPipeline`]: insights fetch, template render, deck upload.
//! - [`RequestWorker`]: the pull loop, with ack-after-reply semantics.

mod consumer;
mod pipeline;

pub use consumer::RequestWorker;
pub use pipeline::DeckPipeline;
