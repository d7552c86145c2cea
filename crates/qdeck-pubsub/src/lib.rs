#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Pub/Sub transport for Quarterdeck.
//!
//! Talks to the Pub/Sub REST API directly (bearer token via
//! `qdeck-gcp-auth`) and layers the request/reply correlation on top:
//!
//! - [`PubsubClient`]: publish, pull, acknowledge against one project.
//! - [`ReplyRouter`]: in-process map from request id to waiting caller.
//! - [`ReplyListener`]: the single background consumer of the reply
//!   subscription, which feeds the router and acknowledges everything
//!   it pulls.
//! - [`PubsubDeckRelay`]: the `DeckRelay` implementation the public API
//!   uses to publish a request and wait for its correlated reply.

mod client;
mod listener;
mod relay;
mod router;

pub use client::{PubsubClient, PubsubMessage, ReceivedMessage, REQUEST_ID_ATTRIBUTE};
pub use listener::ReplyListener;
pub use relay::PubsubDeckRelay;
pub use router::ReplyRouter;
