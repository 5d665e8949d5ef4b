// transparenc/crates/transparenc/src/lib.rs

pub mod api;
pub mod chat;
pub mod config;
pub mod documents;
pub mod handoff;
pub mod memory;
pub mod memory_db;
pub mod metrics;
pub mod render;
pub mod telemetry;
pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;

// Public API exports
pub use api::{ApiClient, ChatBackend, ChatStreamRequest, DocRetrievalRequest};
pub use chat::{ChatController, ChatMessage, ChatMode, ChatSession, MessageContent, SessionEvent, SessionObserver};
pub use config::Config;
pub use documents::{DocumentRecord, RetrievalView};
pub use handoff::{KeyValueStorage, LocalStorage, SessionStorage};
pub use memory::{ChatStore, InMemoryChatStore};
pub use memory_db::MemoryDatabase;
