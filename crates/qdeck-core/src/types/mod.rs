//! Core types for deck generation requests and replies.

mod ids;
mod proptests;
mod quarter;
mod reply;
mod request;

pub use ids::RequestId;
pub use quarter::FiscalQuarter;
pub use reply::{DeckReady, DeckReply};
pub use request::GenerateRequest;
