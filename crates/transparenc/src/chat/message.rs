use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::RetrievalView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message body: plain text, or a structured retrieval payload kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl MessageContent {
    /// Wraps a retrieval payload. JSON strings become text so they render as text.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => MessageContent::Text(text),
            other => MessageContent::Structured(other),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
        }
    }

    pub fn retrieval_view(&self) -> Option<RetrievalView> {
        match self {
            MessageContent::Structured(value) => Some(RetrievalView::classify(value)),
            MessageContent::Text(_) => None,
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Wire form of a message sent to `/claude-stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn user(content: &str) -> Self {
        Self { role: Role::User.as_str().to_string(), content: content.to_string() }
    }
}
