use dashmap::DashMap;
use std::sync::Arc;

use crate::chat::ChatSession;

/// Persistence seam for chat sessions, keyed by chat id.
///
/// Last write wins per id. `save_chat` stamps the record with the current
/// time and returns the stamp it wrote.
pub trait ChatStore: Send + Sync {
    fn save_chat(&self, chat: &ChatSession) -> anyhow::Result<i64>;
    fn get_chat(&self, id: &str) -> anyhow::Result<Option<ChatSession>>;
    /// All sessions in ascending timestamp order.
    fn get_all_chats(&self) -> anyhow::Result<Vec<ChatSession>>;
    /// Returns whether a record existed.
    fn delete_chat(&self, id: &str) -> anyhow::Result<bool>;
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Clone, Default)]
pub struct InMemoryChatStore {
    store: Arc<DashMap<String, ChatSession>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl ChatStore for InMemoryChatStore {
    fn save_chat(&self, chat: &ChatSession) -> anyhow::Result<i64> {
        let mut record = chat.clone();
        record.timestamp = now_millis();
        let stamp = record.timestamp;
        self.store.insert(record.id.clone(), record);
        Ok(stamp)
    }

    fn get_chat(&self, id: &str) -> anyhow::Result<Option<ChatSession>> {
        Ok(self.store.get(id).map(|entry| entry.clone()))
    }

    fn get_all_chats(&self) -> anyhow::Result<Vec<ChatSession>> {
        let mut chats: Vec<ChatSession> = self.store.iter().map(|entry| entry.value().clone()).collect();
        chats.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(chats)
    }

    fn delete_chat(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.store.remove(id).is_some())
    }
}
