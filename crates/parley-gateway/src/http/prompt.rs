//! One-shot prompt endpoint: POST /api/openai/prompt
//!
//! Request:  `{"prompt": "..."}`
//! Response: `{"success": true, "response": "..."}` with thinking and code
//! artifacts stripped from the text.

use axum::{extract::State, Json};
use parley_agent::PromptType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Serialize)]
pub struct PromptReply {
    pub success: bool,
    pub response: String,
}

pub async fn prompt_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptReply>, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }

    let resp = state.agent.chat(&req.prompt, PromptType::Default).await?;
    let parsed = parley_stream::parse_complete(&resp.content);
    debug!(
        artifacts = parsed.artifacts.len(),
        tokens_out = resp.tokens_out,
        "prompt answered"
    );

    Ok(Json(PromptReply {
        success: true,
        response: parsed.display_content,
    }))
}
