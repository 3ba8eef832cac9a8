//! Scripted provider and state builders shared by the gateway tests.

use async_trait::async_trait;
use parley_agent::{
    AgentRuntime, ChatRequest, ChatResponse, LlmProvider, ProviderError, StreamEvent,
};
use parley_core::ParleyConfig;
use parley_sessions::SessionStore;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::app::AppState;

/// What the scripted provider answers with.
#[derive(Debug, Clone, Default)]
pub struct Script {
    deltas: Vec<String>,
    fail_with: Option<String>,
    /// Sent as a mid-stream error after the deltas.
    stream_error: Option<String>,
}

impl Script {
    pub fn deltas(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn then_stream_error(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }
}

pub struct ScriptedProvider {
    script: Script,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(message) = &self.script.fail_with {
            return Err(ProviderError::Unavailable(message.clone()));
        }
        Ok(ChatResponse {
            content: self.script.deltas.concat(),
            model: req.model.clone(),
            tokens_in: 0,
            tokens_out: 0,
            stop_reason: "stop".to_string(),
        })
    }

    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(message) = &self.script.fail_with {
            return Err(ProviderError::Unavailable(message.clone()));
        }
        for text in &self.script.deltas {
            if tx.send(StreamEvent::TextDelta { text: text.clone() }).await.is_err() {
                return Ok(());
            }
        }
        let last = match &self.script.stream_error {
            Some(message) => StreamEvent::Error {
                message: message.clone(),
            },
            None => StreamEvent::Done {
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".to_string(),
            },
        };
        let _ = tx.send(last).await;
        Ok(())
    }
}

pub fn test_state(script: Script) -> Arc<AppState> {
    test_state_with(Arc::new(ScriptedProvider::new(script)))
}

pub fn test_state_with(provider: Arc<ScriptedProvider>) -> Arc<AppState> {
    let agent = AgentRuntime::new(provider, "test-model");
    let sessions = SessionStore::open_in_memory().expect("in-memory store");
    Arc::new(AppState::new(ParleyConfig::default(), agent, sessions))
}

pub async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
