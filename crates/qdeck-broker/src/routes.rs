//! Request handlers for the broker API.

use crate::AppState;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use qdeck_core::{DeckReply, Error, FiscalQuarter, GenerateRequest};
use serde::Deserialize;
use serde_json::json;

/// `POST /generate` request body.
///
/// Clients have historically sent the quarter fields both as JSON
/// numbers and as strings, so both are accepted.
#[derive(Debug, Deserialize)]
struct GenerateBody {
    quarter_no: NumberOrString,
    year_no: NumberOrString,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    fn parse(&self, field: &str) -> Result<u64, Error> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse().map_err(|_| {
                Error::validation_field(field, format!("must be a number, got {s:?}"))
            }),
        }
    }
}

impl GenerateBody {
    fn into_request(self) -> Result<GenerateRequest, Error> {
        let quarter_no = self.quarter_no.parse("quarter_no")?;
        let year_no = self.year_no.parse("year_no")?;
        let quarter = FiscalQuarter::new(
            u8::try_from(quarter_no).unwrap_or(u8::MAX),
            u16::try_from(year_no).unwrap_or(u16::MAX),
        )?;

        let mut request = GenerateRequest::new(quarter);
        if let Some(file_id) = self.file_id {
            request = request.with_file_id(file_id);
        }
        Ok(request)
    }
}

fn error_response<S: Into<String>>(status: StatusCode, message: S) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Relays a generation request and answers with the deck link.
async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed: GenerateBody = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {e}"));
        }
    };
    let request = match parsed.into_request() {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let request_id = request.request_id;
    tracing::info!(%request_id, quarter = %request.quarter, "Relaying generation request");

    match state.relay.relay(request, state.relay_timeout).await {
        Ok(DeckReply::Ready(ready)) => {
            tracing::info!(%request_id, file_id = %ready.file_id, "Deck ready");
            (
                StatusCode::OK,
                Json(json!({
                    "presentation_link": ready.presentation_link,
                    "file_id": ready.file_id,
                    "request_id": ready.request_id,
                })),
            )
                .into_response()
        }
        Ok(DeckReply::Failed { error, .. }) => {
            tracing::warn!(%request_id, %error, "Worker reported failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error)
        }
        Err(err @ Error::Timeout { .. }) => {
            tracing::warn!(%request_id, "No reply within the relay timeout");
            error_response(StatusCode::GATEWAY_TIMEOUT, err.to_string())
        }
        Err(err) => {
            tracing::error!(%request_id, error = %err, "Relay failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Reports readiness of the reply listener.
async fn healthz(State(state): State<AppState>) -> Response {
    let listener_state = state.listener.state();
    if listener_state.is_ready() {
        (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": listener_state.to_string() })),
        )
            .into_response()
    }
}

/// Builds the API router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/healthz", get(healthz))
        .with_state(state)
}
