use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use mona_sdk::objects::{HealthResponse, LIVENESS_TEXT};

use crate::state::AppState;

/// `GET /`: plain-text liveness probe.
pub(super) async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

/// `GET /health`: JSON health report.
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.relay.hub().len(),
    })
}

/// `GET /state`: snapshot of the entity cache.
///
/// Single-flag deployments keep no cache and answer `404`.
pub(super) async fn entity_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.relay.cache() {
        Some(cache) => Json(cache.snapshot()).into_response(),
        None => (StatusCode::NOT_FOUND, "entity state is not tracked").into_response(),
    }
}
