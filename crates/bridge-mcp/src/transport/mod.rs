//! Transport layer.
//!
//! Two ways in, one envelope stream out: an SSE pairing (`GET /sse`
//! for responses, `POST /message` for requests) and a bidirectional
//! WebSocket (`GET /ws`). Framing differences stay in here; the
//! dispatcher only ever sees `(session, envelope)`.

pub mod sse;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bridge_core::Heartbeat;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::dispatcher::Dispatcher;
use crate::session::SessionRegistry;

/// Shared state for every transport handler.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionRegistry>,
    pub heartbeat: Heartbeat,
    /// Maximum tick age before /healthz reports the loop dead.
    pub liveness_threshold: Duration,
}

/// Build the bridge router: SSE + WebSocket endpoints and liveness.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sse", get(sse::sse_handler))
        .route("/message", post(sse::message_handler))
        .route("/ws", get(websocket::ws_handler))
        .route("/healthz", get(healthz_handler))
        .layer(cors)
        .with_state(state)
}

/// 200 while the host tick loop is alive and draining; 503 otherwise.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let age = state.heartbeat.age();
    if state.heartbeat.is_alive(state.liveness_threshold) {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "tick_age_ms": age.as_millis() as u64
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "host tick loop is not draining",
            })),
        )
    }
}
