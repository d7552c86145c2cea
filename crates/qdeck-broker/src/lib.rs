#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Public HTTP surface of the deck service.
//!
//! A thin broker: `POST /generate` validates the requested quarter,
//! relays it through a [`DeckRelay`] and blocks until the worker's
//! reply (or the relay timeout) comes back. `GET /healthz` reports
//! whether the reply listener behind the relay is up.

mod routes;

pub use routes::router;

use axum::Router;
use qdeck_core::service::ServiceHandle;
use qdeck_core::{DeckRelay, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Shared state behind the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay carrying requests to the worker fleet.
    pub relay: Arc<dyn DeckRelay>,

    /// Lifecycle of the reply listener feeding the relay.
    pub listener: ServiceHandle,

    /// How long `/generate` waits for a worker reply.
    pub relay_timeout: Duration,
}

/// Serves the API until the shutdown signal flips to `true`.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "API listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            tracing::info!("API shutting down");
        })
        .await?;
    Ok(())
}
