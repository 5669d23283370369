//! Axum router construction for the viewer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the viewer server.
///
/// The router includes:
/// - `GET /` -- dashboard page
/// - `GET /ws` -- `WebSocket` telemetry stream and request channel
/// - `GET /api/status` -- simulation process status
/// - `POST /api/commands` -- submit a request envelope
///
/// CORS is configured to allow any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dashboard
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws", get(ws::ws_viewer))
        // REST API
        .route("/api/status", get(handlers::get_status))
        .route("/api/commands", post(handlers::post_command))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
