//! Session CRUD under /api/chat/sessions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSession {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameSession {
    #[serde(default)]
    pub title: String,
}

/// POST /api/chat/sessions: body optional.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateSession>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let session = state.sessions.create(req.title.as_deref())?;
    info!(id = %session.id, title = %session.title, "chat session created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "session": session })),
    ))
}

/// GET /api/chat/sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let sessions = state.sessions.list()?;
    Ok(Json(json!({ "success": true, "sessions": sessions })))
}

/// GET /api/chat/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .sessions
        .get(&id)?
        .ok_or(parley_core::ParleyError::SessionNotFound { id })?;
    Ok(Json(json!({ "success": true, "session": session })))
}

/// PUT /api/chat/sessions/{id}: `{"title": "..."}`
pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameSession>,
) -> Result<Json<Value>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    state.sessions.rename(&id, &req.title)?;
    Ok(Json(json!({ "success": true, "message": "Session title updated" })))
}

/// DELETE /api/chat/sessions/{id}
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.sessions.delete(&id)?;
    info!(%id, "chat session deleted");
    Ok(Json(json!({ "success": true, "message": "Session deleted" })))
}

/// DELETE /api/chat/sessions: drop every session.
pub async fn clear_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let removed = state.sessions.clear()?;
    info!(removed, "all chat sessions cleared");
    Ok(Json(json!({ "success": true, "removed": removed })))
}
