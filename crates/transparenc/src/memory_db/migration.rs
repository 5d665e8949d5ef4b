//! Schema versioning and store maintenance

use rusqlite::{params, Connection, OptionalExtension, Result};
use tracing::{error, info, warn};

use crate::memory_db::schema;

pub struct MigrationManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Creates the version table if needed and applies pending migrations.
    pub fn initialize_database(&mut self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        let current_version = self.get_current_version()?;
        info!("Current chat history schema version: {}", current_version);

        self.apply_migrations(current_version)
    }

    fn apply_migrations(&mut self, current_version: i32) -> Result<()> {
        for (version, migration_sql) in get_migrations() {
            if version > current_version {
                info!("Applying migration {}...", version);

                let tx = self.conn.transaction()?;
                if let Err(e) = tx.execute_batch(migration_sql) {
                    error!("Failed to apply migration {}: {}", version, e);
                    return Err(e);
                }
                tx.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
                tx.commit()?;

                info!("Migration {} applied successfully", version);
            }
        }
        Ok(())
    }

    /// Deletes chats whose last save is older than the cutoff.
    pub fn cleanup_old_data(&mut self, older_than_days: u32) -> Result<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let deleted = self.conn.execute(
            "DELETE FROM chats WHERE timestamp < ?1",
            params![cutoff.timestamp_millis()],
        )?;

        info!("Cleaned up {} old chats", deleted);

        if deleted > 0 {
            self.conn.execute_batch("VACUUM")?;
            info!("Database vacuum completed");
        }
        Ok(deleted)
    }

    pub fn get_current_version(&self) -> Result<i32> {
        self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }

    pub fn has_migration_applied(&self, version: i32) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM schema_version WHERE version = ?",
                [version],
                |_| Ok(1),
            )
            .optional()
            .map(|result| result.is_some())
    }
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, schema::SCHEMA_SQL)]
}

/// Read-only statistics; safe while other connections write.
pub fn get_database_stats(conn: &Connection) -> Result<schema::DatabaseStats> {
    let (total_chats, oldest_timestamp, newest_timestamp): (i64, Option<i64>, Option<i64>) = conn
        .query_row(
            "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM chats",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .or_else(|e| {
            warn!("Failed to read chat counts: {}", e);
            Ok::<_, rusqlite::Error>((0, None, None))
        })?;

    let json_total = |column: &str| -> i64 {
        conn.query_row(
            &format!("SELECT COALESCE(SUM(json_array_length({})), 0) FROM chats", column),
            [],
            |row| row.get(0),
        )
        .unwrap_or_else(|e| {
            warn!("Failed to count {}: {}", column, e);
            0
        })
    };
    let total_messages = json_total("messages");
    let total_documents = json_total("documents");

    let database_size_bytes: i64 = conn
        .query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(schema::DatabaseStats {
        total_chats,
        total_messages,
        total_documents,
        oldest_timestamp,
        newest_timestamp,
        database_size_bytes,
    })
}
