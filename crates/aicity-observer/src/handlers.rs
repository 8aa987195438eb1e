//! REST handlers: snapshot reads for late-joining observers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use aicity_types::{AgentPublic, CitySnapshot};

use crate::state::AppState;

/// `GET /api/state` -- the full snapshot, consistent with a single day
/// boundary. The re-sync point for observers dropped from the live feed.
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<CitySnapshot> {
    Json(state.snapshot.read().await.clone())
}

/// `GET /api/agents` -- the citizen roll, graveyard included.
pub async fn get_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentPublic>> {
    Json(state.snapshot.read().await.agents.clone())
}

/// `GET /api/newspaper` -- the latest daily paper.
pub async fn get_newspaper(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot.read().await;
    Json(serde_json::json!({
        "day": snapshot.day,
        "body": snapshot.last_newspaper,
    }))
}

/// `GET /healthz` -- liveness.
pub async fn healthz() -> &'static str {
    "ok"
}
