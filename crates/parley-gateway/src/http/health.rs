use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /: service banner.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Parley chat server is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health: liveness probe, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.agent.provider_name(),
        "model": state.agent.model(),
        "ws_clients": state.ws_clients.len(),
    }))
}
