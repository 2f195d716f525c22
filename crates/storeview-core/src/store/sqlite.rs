//! SQLite-backed persistent store.

use super::traits::{KeyValueStore, StoredValue};
use crate::config::StoreConfig;
use crate::error::{Result, StoreviewError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite-based key-value store.
///
/// Every entry is a row of `kv_entries` holding the value kind alongside
/// its text encoding. Keys enumerate in insertion order; overwriting a key
/// keeps its position. Thread-safe via internal mutex on the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the specified database path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreviewError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| StoreviewError::Database {
            message: format!("Failed to open store database: {}", e),
            source: Some(e),
        })?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| StoreviewError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        debug!("Opened SQLite store at {}", db_path.display());
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreviewError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(StoreConfig::BUSY_TIMEOUT)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('string', 'number', 'bool')),
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreviewError::Database {
            message: format!("Failed to initialize store schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StoreviewError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Fetch the raw `(kind, value)` row for a key.
    fn row(&self, key: &str) -> Result<Option<(String, String)>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT kind, value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| StoreviewError::Database {
            message: format!("Failed to read key {}: {}", key, e),
            source: Some(e),
        })
    }

    /// Get the typed value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let Some((kind, raw)) = self.row(key)? else {
            return Ok(None);
        };

        let value = match kind.as_str() {
            "string" => StoredValue::String(raw),
            "number" => StoredValue::Number(raw.parse().map_err(|_| StoreviewError::Store {
                message: format!("Corrupt number under key {}: {}", key, raw),
            })?),
            "bool" => StoredValue::Bool(raw == "true"),
            other => {
                return Err(StoreviewError::Store {
                    message: format!("Unknown value kind {} under key {}", other, key),
                })
            }
        };
        Ok(Some(value))
    }

    fn put(&self, key: &str, value: &StoredValue) -> Result<()> {
        let conn = self.lock()?;
        let encoded = match value {
            StoredValue::String(s) => s.clone(),
            StoredValue::Number(n) => n.to_string(),
            StoredValue::Bool(b) => b.to_string(),
        };
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO kv_entries (key, kind, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind,
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value.kind(), encoded, now],
        )
        .map_err(|e| StoreviewError::Database {
            message: format!("Failed to write key {}: {}", key, e),
            source: Some(e),
        })?;

        Ok(())
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_entries", [])?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.get(key)? {
            Some(StoredValue::String(s)) => Some(s),
            _ => None,
        })
    }

    fn get_number(&self, key: &str) -> Result<Option<f64>> {
        Ok(match self.get(key)? {
            Some(StoredValue::Number(n)) => Some(n),
            _ => None,
        })
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(match self.get(key)? {
            Some(StoredValue::Bool(b)) => Some(b),
            _ => None,
        })
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, &StoredValue::String(value.to_string()))
    }

    fn set_number(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, &StoredValue::Number(value))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, &StoredValue::Bool(value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .map_err(|e| StoreviewError::Database {
                message: format!("Failed to remove key {}: {}", key, e),
                source: Some(e),
            })?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY rowid")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
