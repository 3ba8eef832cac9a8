use parley_stream::Artifact;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Unknown values read back as `Assistant`; only user turns are special-cased.
    pub fn from_db(s: &str) -> Self {
        if s == "user" {
            MessageRole::User
        } else {
            MessageRole::Assistant
        }
    }
}

/// A persisted chat message.
///
/// `content` is what the model saw or said verbatim; for assistant turns
/// `display`, `thinking` and `artifacts` hold the parsed channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Input to [`SessionStore::add_message`](crate::SessionStore::add_message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub display: Option<String>,
    pub thinking: Option<String>,
    pub artifacts: Vec<Artifact>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            display: None,
            thinking: None,
            artifacts: Vec::new(),
        }
    }

    /// An assistant reply: the raw response plus its parsed channels.
    /// Empty thinking is stored as `None`.
    pub fn assistant(
        raw: impl Into<String>,
        display: impl Into<String>,
        thinking: impl Into<String>,
        artifacts: Vec<Artifact>,
    ) -> Self {
        let thinking = thinking.into();
        Self {
            role: MessageRole::Assistant,
            content: raw.into(),
            display: Some(display.into()),
            thinking: (!thinking.is_empty()).then_some(thinking),
            artifacts,
        }
    }
}

/// A session with its full message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<StoredMessage>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row of the session list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    /// Display text of the newest message, if any.
    pub last_message: Option<String>,
    pub message_count: u32,
    pub updated_at: String,
}
