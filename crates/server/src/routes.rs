//! Inbound HTTP boundary.
//!
//! - `POST /api/crawl`: split off `endpoint`, relay everything else, answer with the envelope
//! - `POST /api/preview`: render the outbound request without sending it
//! - `GET /health`, `GET /`: liveness

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crawl_relay_core::{Relay, RelayRequest, RequestPreview, ResultEnvelope, preview};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    relay: Relay,
}

impl AppState {
    #[must_use]
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/crawl", post(crawl))
        .route("/api/preview", post(preview_request))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Crawl relay is running"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn crawl(State(state): State<AppState>, body: Bytes) -> Response {
    let inbound: Value = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let envelope = match RelayRequest::from_inbound(inbound) {
        Ok(request) => state.relay.relay(&request).await,
        Err(e) => {
            warn!(kind = ?e.kind(), status = e.status(), error = %e, "rejected relay request");
            ResultEnvelope::from(e)
        }
    };
    envelope_response(&envelope)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PreviewRequest {
    endpoint: String,
    url: String,
    /// Raw profile text exactly as the operator typed it.
    user_profile: String,
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    #[serde(flatten)]
    request: RequestPreview,
    curl: String,
}

async fn preview_request(body: Bytes) -> Response {
    let req: PreviewRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let request = preview(&req.endpoint, &req.url, &req.user_profile);
    let curl = request.curl_command();
    Json(PreviewResponse { request, curl }).into_response()
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    crawl_relay_core::json::from_slice(body).map_err(|e| {
        warn!(error = %e, "rejected request body");
        let envelope = ResultEnvelope::Failure {
            status: StatusCode::BAD_REQUEST.as_u16(),
            error: format!("Invalid JSON body: {e}"),
            details: None,
        };
        envelope_response(&envelope)
    })
}

fn envelope_response(envelope: &ResultEnvelope) -> Response {
    let status =
        StatusCode::from_u16(envelope.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope.body())).into_response()
}
