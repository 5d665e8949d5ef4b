//! Chat history database - SQLite storage for chat sessions
pub mod schema;
pub mod migration;
pub mod chat_store;

pub use schema::*;
pub use migration::MigrationManager;
pub use chat_store::ChatHistoryStore;

use std::path::Path;
use std::sync::Arc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::chat::ChatSession;
use crate::memory::ChatStore;

pub struct MemoryDatabase {
    pub chats: ChatHistoryStore,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl MemoryDatabase {
    /// Opens (or creates) the database file and brings the schema up to date.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening chat history database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
            });
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            let mut migrator = migration::MigrationManager::new(&mut conn);
            migrator.initialize_database()?;
        }
        info!("Chat history database initialized successfully");
        Ok(Self::from_pool(pool))
    }

    /// Private database for tests. One connection, since every SQLite
    /// `:memory:` connection is a separate database.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;
        {
            let mut conn = pool.get()?;
            migration::MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> Self {
        let pool = Arc::new(pool);
        Self {
            chats: ChatHistoryStore::new(Arc::clone(&pool)),
            pool,
        }
    }

    pub fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        let conn = self.pool.get()?;
        Ok(migration::get_database_stats(&conn)?)
    }

    pub fn cleanup_old_data(&self, older_than_days: u32) -> anyhow::Result<usize> {
        let mut conn = self.pool.get()?;
        let mut migrator = migration::MigrationManager::new(&mut conn);
        Ok(migrator.cleanup_old_data(older_than_days)?)
    }
}

impl ChatStore for MemoryDatabase {
    fn save_chat(&self, chat: &ChatSession) -> anyhow::Result<i64> {
        self.chats.save_chat(chat)
    }

    fn get_chat(&self, id: &str) -> anyhow::Result<Option<ChatSession>> {
        self.chats.get_chat(id)
    }

    fn get_all_chats(&self) -> anyhow::Result<Vec<ChatSession>> {
        self.chats.get_all_chats()
    }

    fn delete_chat(&self, id: &str) -> anyhow::Result<bool> {
        self.chats.delete_chat(id)
    }
}
