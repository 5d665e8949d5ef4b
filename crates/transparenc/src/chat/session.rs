use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, MessageContent, Role};
use crate::documents::DocumentRecord;
use crate::utils::TextUtils;

pub const UNTITLED_CHAT: &str = "Untitled Chat";
const TITLE_MAX_CHARS: usize = 30;

/// Snapshot of one conversation, persisted whole on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Documents the conversation is narrowed to ("document mode").
    #[serde(default)]
    pub active_doc_ids: Vec<String>,
    #[serde(default)]
    pub hidden_context: String,
    /// Every document surfaced by retrieval in this conversation.
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
    /// Milliseconds since the Unix epoch of the last save.
    #[serde(default)]
    pub timestamp: i64,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            active_doc_ids: Vec::new(),
            hidden_context: String::new(),
            documents: Vec::new(),
            timestamp: 0,
        }
    }

    /// Sessions with nothing in them are not worth a row in the store.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.active_doc_ids.is_empty() && self.documents.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Replaces the content of the last message. Returns false on an empty transcript.
    pub fn replace_last(&mut self, content: MessageContent) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.content = content;
                true
            }
            None => false,
        }
    }

    pub fn in_document_mode(&self) -> bool {
        !self.active_doc_ids.is_empty()
    }

    pub fn document(&self, doc_id: &str) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.id == doc_id)
    }

    /// Appends documents not yet known to this session. Returns how many were added.
    ///
    /// Records without an id cannot be selected later, so they are not kept.
    pub fn remember_documents(&mut self, docs: &[DocumentRecord]) -> usize {
        let mut added = 0;
        for doc in docs {
            if doc.has_id() && self.document(&doc.id).is_none() {
                self.documents.push(doc.clone());
                added += 1;
            }
        }
        added
    }

    /// Toggles a document in or out of document mode.
    ///
    /// Unknown ids are refused so every active id stays resolvable.
    pub fn toggle_document(&mut self, doc_id: &str) -> bool {
        if let Some(pos) = self.active_doc_ids.iter().position(|id| id == doc_id) {
            self.active_doc_ids.remove(pos);
            return true;
        }
        if self.document(doc_id).is_none() {
            return false;
        }
        self.active_doc_ids.push(doc_id.to_string());
        true
    }

    pub fn clear_active_documents(&mut self) -> bool {
        let had_any = !self.active_doc_ids.is_empty();
        self.active_doc_ids.clear();
        had_any
    }

    /// Label for history listings: the first user message, shortened.
    pub fn title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.as_text())
            .map(|text| TextUtils::truncate_chars(text, TITLE_MAX_CHARS).into_owned())
            .unwrap_or_else(|| UNTITLED_CHAT.to_string())
    }
}
