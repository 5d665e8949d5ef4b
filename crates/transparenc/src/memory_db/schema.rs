//! Database schema for the chat history store
use serde::{Deserialize, Serialize};

/// Aggregate counts reported by `transparenc stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub total_chats: i64,
    pub total_messages: i64,
    pub total_documents: i64,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
    pub database_size_bytes: i64,
}

/// Version 1: one row per chat, JSON columns for the nested lists.
pub const SCHEMA_SQL: &str = "
-- Chats table
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    messages TEXT NOT NULL DEFAULT '[]',
    active_doc_ids TEXT NOT NULL DEFAULT '[]',
    hidden_context TEXT NOT NULL DEFAULT '',
    documents TEXT NOT NULL DEFAULT '[]',
    timestamp INTEGER NOT NULL
);
-- Listing order
CREATE INDEX IF NOT EXISTS idx_chats_timestamp ON chats (timestamp);
";
