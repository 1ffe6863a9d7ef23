use crate::config::LlmConfig;
use crate::indexer::store::{PersistenceError, VectorPersistence};
use crate::indexer::{ChunkMetadata, VectorDocument};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DB_FILE_NAME: &str = "codebase-rag.db";

/// Settings key for the persisted `LlmConfig`
pub const LLM_CONFIG_KEY: &str = "llm_config";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vectors (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding TEXT NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vectors_file ON vectors(file_path);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQLite storage for vectors, store metadata and settings
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database inside `data_dir`
    pub fn open(data_dir: &Path) -> SqliteResult<Self> {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            log::warn!("[Database] Could not create {}: {}", data_dir.display(), e);
        }
        let conn = Connection::open(data_dir.join(DB_FILE_NAME))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> SqliteResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqliteResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Vectors

    /// Bulk upsert in a single transaction
    pub fn save_vectors(&self, docs: &[VectorDocument]) -> Result<(), PersistenceError> {
        let mut conn = self.lock();
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO vectors
                 (id, file_path, content, embedding, start_offset, end_offset, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for doc in docs {
                let embedding_json = serde_json::to_string(&doc.embedding)?;
                stmt.execute(params![
                    doc.id,
                    doc.file_path,
                    doc.content,
                    embedding_json,
                    doc.metadata.start_offset as i64,
                    doc.metadata.end_offset as i64,
                    &now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_vectors(&self) -> Result<Vec<VectorDocument>, PersistenceError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, file_path, content, embedding, start_offset, end_offset
             FROM vectors ORDER BY file_path, start_offset",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, file_path, content, embedding, start, end)| -> Result<_, PersistenceError> {
                Ok(VectorDocument {
                    id,
                    file_path,
                    content,
                    embedding: serde_json::from_str(&embedding)?,
                    metadata: ChunkMetadata {
                        start_offset: start.max(0) as usize,
                        end_offset: end.max(0) as usize,
                    },
                })
            })
            .collect()
    }

    pub fn clear_vectors(&self) -> SqliteResult<usize> {
        let conn = self.lock();
        conn.execute("DELETE FROM vectors", [])
    }

    pub fn count_vectors(&self) -> SqliteResult<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // Meta

    pub fn get_meta_value(&self, key: &str) -> SqliteResult<Option<String>> {
        let conn = self.lock();
        conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
    }

    pub fn set_meta_value(&self, key: &str, value: &str) -> SqliteResult<()> {
        let conn = self.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO meta (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, &now],
        )?;
        Ok(())
    }

    // Settings (key-value store for provider configuration)

    pub fn get_setting(&self, key: &str) -> SqliteResult<Option<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let value = stmt.query_row([key], |row| row.get(0)).optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> SqliteResult<()> {
        let conn = self.lock();
        let now = Utc::now().to_rfc3339();

        // Upsert: insert or replace
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, &now],
        )?;

        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> SqliteResult<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }

    /// Load the persisted provider configuration, or defaults
    pub fn load_config(&self) -> LlmConfig {
        let raw = match self.get_setting(LLM_CONFIG_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LlmConfig::default(),
            Err(e) => {
                log::warn!("[Database] Failed to read settings, using defaults: {}", e);
                return LlmConfig::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("[Database] Stored config is invalid, using defaults: {}", e);
            LlmConfig::default()
        })
    }

    pub fn save_config(&self, config: &LlmConfig) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(config)?;
        self.set_setting(LLM_CONFIG_KEY, &raw)?;
        Ok(())
    }
}

impl VectorPersistence for Database {
    fn save_documents(&self, docs: &[VectorDocument]) -> Result<(), PersistenceError> {
        self.save_vectors(docs)
    }

    fn load_documents(&self) -> Result<Vec<VectorDocument>, PersistenceError> {
        self.list_vectors()
    }

    fn clear_documents(&self) -> Result<(), PersistenceError> {
        let deleted = self.clear_vectors()?;
        log::debug!("[Database] Cleared {} vectors", deleted);
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get_meta_value(key)?)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        Ok(self.set_meta_value(key, value)?)
    }
}
