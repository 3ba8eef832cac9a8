//! Chat turn driver shared by the SSE and WebSocket transports.
//!
//! One turn: persist the user message, stream the model's reply through a
//! fresh `StreamParser`, push the resulting frames to the client, then
//! persist the assistant message. Dropping the frame receiver abandons the
//! turn and aborts the provider request.

use parley_agent::{Message, PromptType, StreamEvent};
use parley_core::ParleyError;
use parley_protocol::{CompletePayload, StreamFrame};
use parley_sessions::{MessageRole, NewMessage, SessionError, StoredMessage};
use parley_stream::{ParsedChunk, StreamParser};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::app::AppState;

#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Target session; `None` or an unknown id starts a new one.
    pub session_id: Option<String>,
    pub message: String,
    pub prompt_type: PromptType,
}

impl TurnRequest {
    pub fn validate(&self) -> Result<(), ParleyError> {
        if self.message.trim().is_empty() {
            return Err(ParleyError::InvalidRequest("message is required".to_string()));
        }
        Ok(())
    }
}

enum TurnError {
    /// The frame receiver was dropped.
    ClientGone,
    Failed(ParleyError),
}

impl From<ParleyError> for TurnError {
    fn from(err: ParleyError) -> Self {
        TurnError::Failed(err)
    }
}

impl From<SessionError> for TurnError {
    fn from(err: SessionError) -> Self {
        TurnError::Failed(err.into())
    }
}

/// Aborts the provider task when the turn ends early.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one turn, reporting failures to the client as an `error` frame.
pub async fn run_turn(state: Arc<AppState>, req: TurnRequest, frames: mpsc::Sender<StreamFrame>) {
    match drive(&state, req, &frames).await {
        Ok(()) => {}
        Err(TurnError::ClientGone) => debug!("client went away, turn abandoned"),
        Err(TurnError::Failed(err)) => {
            warn!(error = %err, "chat turn failed");
            let _ = frames.send(StreamFrame::error(err.to_string())).await;
            let _ = frames.send(StreamFrame::Typing { status: false }).await;
        }
    }
}

async fn drive(
    state: &Arc<AppState>,
    req: TurnRequest,
    frames: &mpsc::Sender<StreamFrame>,
) -> Result<(), TurnError> {
    req.validate()?;

    let session = match &req.session_id {
        Some(id) => state.sessions.get_or_create(id)?,
        None => state.sessions.create(None)?,
    };
    state
        .sessions
        .add_message(&session.id, NewMessage::user(req.message.as_str()))?;
    let history: Vec<Message> = state
        .sessions
        .history(&session.id, state.config.chat.history_window)?
        .into_iter()
        .map(to_agent_message)
        .collect();

    emit(frames, StreamFrame::Typing { status: true }).await?;

    let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(64);
    let provider_state = Arc::clone(state);
    let prompt_type = req.prompt_type;
    let _provider = AbortOnDrop(tokio::spawn(async move {
        let result = provider_state
            .agent
            .chat_stream(history, prompt_type, event_tx.clone())
            .await;
        if let Err(e) = result {
            let _ = event_tx
                .send(StreamEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    }));

    let mut parser = StreamParser::new();
    let mut diff = FrameDiff::default();
    let mut raw = String::new();

    loop {
        match event_rx.recv().await {
            Some(StreamEvent::TextDelta { text }) => {
                raw.push_str(&text);
                let parsed = parser.parse_chunk(&text, false);
                emit(frames, StreamFrame::Chunk { content: text }).await?;
                for frame in diff.frames(&parsed) {
                    emit(frames, frame).await?;
                }
            }
            Some(StreamEvent::Done {
                model,
                tokens_in,
                tokens_out,
                stop_reason,
            }) => {
                debug!(%model, tokens_in, tokens_out, %stop_reason, "provider stream finished");
                break;
            }
            Some(StreamEvent::Error { message }) => {
                return Err(ParleyError::LlmProvider(message).into());
            }
            None => {
                return Err(ParleyError::LlmProvider("stream ended unexpectedly".to_string()).into());
            }
        }
    }

    let parsed = parser.finalize();
    for frame in diff.frames(&parsed) {
        emit(frames, frame).await?;
    }

    let stored = state.sessions.add_message(
        &session.id,
        NewMessage::assistant(
            raw,
            parsed.display_content.as_str(),
            parsed.thinking_content.as_str(),
            parsed.artifacts.clone(),
        ),
    )?;
    // The user message may have retitled the session.
    let title = state
        .sessions
        .get(&session.id)?
        .map(|s| s.title)
        .unwrap_or(session.title);

    info!(
        session_id = %session.id, artifacts = parsed.artifacts.len(),
        display_len = parsed.display_content.len(), "chat turn complete"
    );
    emit(
        frames,
        StreamFrame::Complete(Box::new(CompletePayload {
            id: stored.id,
            content: parsed.display_content,
            thinking: parsed.thinking_content,
            artifacts: parsed.artifacts,
            session_id: session.id,
            session_title: title,
        })),
    )
    .await?;
    emit(frames, StreamFrame::Typing { status: false }).await
}

async fn emit(frames: &mpsc::Sender<StreamFrame>, frame: StreamFrame) -> Result<(), TurnError> {
    frames.send(frame).await.map_err(|_| TurnError::ClientGone)
}

fn to_agent_message(message: StoredMessage) -> Message {
    match message.role {
        MessageRole::User => Message::user(message.content),
        MessageRole::Assistant => Message::assistant(message.content),
    }
}

/// Turns successive parser snapshots into the frames that are new since the
/// previous snapshot.
#[derive(Debug, Default)]
pub struct FrameDiff {
    display_len: usize,
    thinking: String,
    thinking_active: bool,
    artifacts_sent: usize,
}

impl FrameDiff {
    pub fn frames(&mut self, parsed: &ParsedChunk) -> Vec<StreamFrame> {
        let mut out = Vec::new();

        if let Some(delta) = parsed.display_content.get(self.display_len..) {
            if !delta.is_empty() {
                out.push(StreamFrame::Display {
                    delta: delta.to_string(),
                });
                self.display_len = parsed.display_content.len();
            }
        }

        if parsed.thinking_content != self.thinking || parsed.is_thinking_active != self.thinking_active {
            self.thinking = parsed.thinking_content.clone();
            self.thinking_active = parsed.is_thinking_active;
            out.push(StreamFrame::Thinking {
                content: self.thinking.clone(),
                active: self.thinking_active,
            });
        }

        for artifact in parsed.artifacts.iter().skip(self.artifacts_sent) {
            out.push(StreamFrame::Artifact(artifact.clone()));
        }
        self.artifacts_sent = self.artifacts_sent.max(parsed.artifacts.len());

        out
    }
}
