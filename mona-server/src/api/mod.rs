//! HTTP and WebSocket handlers.
//!
//! # Endpoints
//!
//! - `GET /`       – liveness text
//! - `GET /health` – status, version and subscriber count
//! - `GET /state`  – last known entity states (multi-entity deployments)
//! - `GET /ws`     – WebSocket notification stream (`/ws/` is accepted too)

mod status;
mod ws;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Build the public API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status::liveness))
        .route("/health", get(status::health))
        .route("/state", get(status::entity_state))
        .route("/ws", get(ws::subscribe_ws))
        .route("/ws/", get(ws::subscribe_ws))
}
