use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use parley_agent::PromptType;
use parley_core::{config::MAX_PAYLOAD_BYTES, ParleyError};
use parley_protocol::{ClientFrame, StreamFrame};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::turn::{run_turn, TurnRequest};

/// Axum handler, upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection event loop, lives for the entire WS session.
///
/// Runs at most one chat turn at a time; closing the socket abandons the
/// running turn.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
    state.ws_clients.insert(conn_id.clone(), out_tx.clone());

    let mut turn: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let busy = turn.as_ref().is_some_and(|t| !t.is_finished());
                        match parse_inbound(text.as_str()) {
                            Ok(_) if busy => {
                                let frame = StreamFrame::error("a reply is still in progress");
                                let _ = out_tx.send(frame.to_ws_text()).await;
                            }
                            Ok(req) => {
                                debug!(conn_id, session_id = ?req.session_id, "WS chat turn");
                                turn = Some(start_turn(Arc::clone(&state), req, out_tx.clone()));
                            }
                            Err(e) => {
                                warn!(conn_id, error = %e, "rejected WS frame");
                                let _ = out_tx.send(StreamFrame::error(e.to_string()).to_ws_text()).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }

            out = out_rx.recv() => {
                let Some(text) = out else { break };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(turn) = turn {
        turn.abort();
    }
    state.ws_clients.remove(&conn_id);
    info!(conn_id, "WS connection closed");
}

/// Validate an inbound text frame and turn it into a chat turn request.
fn parse_inbound(text: &str) -> Result<TurnRequest, ParleyError> {
    if text.len() > MAX_PAYLOAD_BYTES {
        return Err(ParleyError::PayloadTooLarge {
            size: text.len(),
            max: MAX_PAYLOAD_BYTES,
        });
    }
    let frame = ClientFrame::parse(text)
        .map_err(|e| ParleyError::InvalidRequest(format!("unrecognised frame: {e}")))?;
    let message = frame.into_message();
    let req = TurnRequest {
        session_id: message.session_id.filter(|id| !id.trim().is_empty()),
        message: message.message,
        prompt_type: message
            .prompt_type
            .as_deref()
            .map(PromptType::parse)
            .unwrap_or_default(),
    };
    req.validate()?;
    Ok(req)
}

/// Run a turn and forward its frames to the connection's outbound queue.
fn start_turn(state: Arc<AppState>, req: TurnRequest, out: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (tx, mut rx) = mpsc::channel::<StreamFrame>(64);
        tokio::spawn(run_turn(state, req, tx));
        // Returning drops `rx`, which makes the turn stop at its next frame.
        while let Some(frame) = rx.recv().await {
            if out.send(frame.to_ws_text()).await.is_err() {
                break;
            }
        }
    })
}
