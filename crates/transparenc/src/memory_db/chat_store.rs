use std::sync::Arc;

use anyhow::Context;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use tracing::{debug, warn};

use crate::chat::ChatSession;
use crate::memory::{now_millis, ChatStore};

/// Chat rows: scalar columns plus JSON text for the nested lists.
pub struct ChatHistoryStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl ChatHistoryStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    fn row_to_chat(row: &Row) -> anyhow::Result<ChatSession> {
        let id: String = row.get(0)?;
        let messages: String = row.get(1)?;
        let active_doc_ids: String = row.get(2)?;
        let documents: String = row.get(4)?;

        Ok(ChatSession {
            messages: serde_json::from_str(&messages)
                .with_context(|| format!("Corrupt messages column for chat {}", id))?,
            active_doc_ids: serde_json::from_str(&active_doc_ids)
                .with_context(|| format!("Corrupt active_doc_ids column for chat {}", id))?,
            hidden_context: row.get(3)?,
            documents: serde_json::from_str(&documents)
                .with_context(|| format!("Corrupt documents column for chat {}", id))?,
            timestamp: row.get(5)?,
            id,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, messages, active_doc_ids, hidden_context, documents, timestamp FROM chats";

impl ChatStore for ChatHistoryStore {
    fn save_chat(&self, chat: &ChatSession) -> anyhow::Result<i64> {
        let stamp = now_millis();
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO chats (id, messages, active_doc_ids, hidden_context, documents, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                messages = excluded.messages,
                active_doc_ids = excluded.active_doc_ids,
                hidden_context = excluded.hidden_context,
                documents = excluded.documents,
                timestamp = excluded.timestamp",
            params![
                chat.id,
                serde_json::to_string(&chat.messages)?,
                serde_json::to_string(&chat.active_doc_ids)?,
                chat.hidden_context,
                serde_json::to_string(&chat.documents)?,
                stamp,
            ],
        )?;
        debug!("Saved chat {} ({} messages)", chat.id, chat.messages.len());
        Ok(stamp)
    }

    fn get_chat(&self, id: &str) -> anyhow::Result<Option<ChatSession>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
        let mut rows = stmt.query([id])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_chat(row)?)),
            None => Ok(None),
        }
    }

    fn get_all_chats(&self) -> anyhow::Result<Vec<ChatSession>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY timestamp ASC, id ASC", SELECT_COLUMNS))?;
        let mut rows = stmt.query([])?;
        let mut chats = Vec::new();

        while let Some(row) = rows.next()? {
            match Self::row_to_chat(row) {
                Ok(chat) => chats.push(chat),
                // one bad row should not hide the rest of the history
                Err(e) => warn!("Skipping unreadable chat row: {:#}", e),
            }
        }
        Ok(chats)
    }

    fn delete_chat(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM chats WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}
