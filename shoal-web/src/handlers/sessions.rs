//! Operator endpoints: session listing and liveness.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::server::AppState;

pub async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.registry.sessions();
    Json(json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.registry.len(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}
