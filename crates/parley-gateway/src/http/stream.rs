//! Server-sent events chat endpoint.
//!
//! `GET /api/chat/stream?message=...&sessionId=...&promptType=...`
//! Each `StreamFrame` becomes one SSE event named after the frame
//! (`typing`, `chunk`, `display`, `thinking`, `artifact`, `complete`,
//! `error`) with the JSON payload as data.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use parley_agent::PromptType;
use parley_protocol::StreamFrame;
use serde::Deserialize;
use std::{convert::Infallible, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::turn::{run_turn, TurnRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    #[serde(default)]
    pub message: String,
    pub session_id: Option<String>,
    pub prompt_type: Option<String>,
}

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("sessionId is required"))?;

    let req = TurnRequest {
        session_id: Some(session_id),
        message: query.message,
        prompt_type: query
            .prompt_type
            .as_deref()
            .map(PromptType::parse)
            .unwrap_or_default(),
    };
    req.validate()?;
    info!(session_id = ?req.session_id, prompt_type = ?req.prompt_type, "SSE chat turn");

    let (tx, mut rx) = mpsc::channel::<StreamFrame>(64);
    tokio::spawn(run_turn(state, req, tx));

    // Dropping this stream (client hang-up) closes `rx`, which ends the turn.
    let stream = async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            yield Ok(Event::default().event(frame.name()).data(frame.payload().to_string()));
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
