//! Route table for the observer server.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the axum application.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/state", get(handlers::get_state))
        .route("/api/agents", get(handlers::get_agents))
        .route("/api/newspaper", get(handlers::get_newspaper))
        .route("/ws/days", get(ws::ws_days))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
