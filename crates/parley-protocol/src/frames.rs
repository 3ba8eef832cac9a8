use parley_stream::Artifact;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → Client event emitted while a chat turn runs.
///
/// WebSocket wire: `{ "event": "chat:response:chunk", "payload": {...} }`.
/// Over SSE the short [`name`](StreamFrame::name) is the event name and the
/// payload alone is the data line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum StreamFrame {
    /// The assistant started (`true`) or stopped (`false`) producing a reply.
    #[serde(rename = "chat:typing")]
    Typing { status: bool },

    /// Raw model delta, tags included.
    #[serde(rename = "chat:response:chunk")]
    Chunk { content: String },

    /// Display text that became final since the previous frame.
    #[serde(rename = "chat:response:display")]
    Display { delta: String },

    /// Current thinking text and whether a thinking region is still open.
    #[serde(rename = "chat:response:thinking")]
    Thinking { content: String, active: bool },

    /// A code artifact that just closed.
    #[serde(rename = "chat:response:artifact")]
    Artifact(Artifact),

    #[serde(rename = "chat:response:complete")]
    Complete(Box<CompletePayload>),

    #[serde(rename = "chat:error")]
    Error { message: String },
}

/// Final summary of a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayload {
    /// Id of the persisted assistant message.
    pub id: String,
    /// Cleaned display text.
    pub content: String,
    pub thinking: String,
    pub artifacts: Vec<Artifact>,
    pub session_id: String,
    pub session_title: String,
}

impl StreamFrame {
    /// Short event name, used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            StreamFrame::Typing { .. } => "typing",
            StreamFrame::Chunk { .. } => "chunk",
            StreamFrame::Display { .. } => "display",
            StreamFrame::Thinking { .. } => "thinking",
            StreamFrame::Artifact(_) => "artifact",
            StreamFrame::Complete(_) => "complete",
            StreamFrame::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamFrame::Error {
            message: message.into(),
        }
    }

    /// The payload object on its own.
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("payload").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Full WebSocket text frame.
    pub fn to_ws_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"event":"chat:error","payload":{"message":"frame serialization failed"}}"#
                .to_string()
        })
    }

    /// Frames that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Complete(_) | StreamFrame::Error { .. })
    }
}

/// Client → Server WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientFrame {
    #[serde(rename = "chat:message")]
    Message(MessageBody),
}

/// `chat:message` payload: either a bare string or a full object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Full(ChatMessage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
}

impl ClientFrame {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn into_message(self) -> ChatMessage {
        match self {
            ClientFrame::Message(MessageBody::Text(message)) => ChatMessage {
                message,
                ..ChatMessage::default()
            },
            ClientFrame::Message(MessageBody::Full(message)) => message,
        }
    }
}
