//! Fixed-key local state.
//!
//! Serialized JSON blobs stored under fixed string keys, one row per key:
//! the signed-in session and the studio snapshot. A value that no longer
//! parses is treated as absent, so corrupt stored state degrades to the
//! defaults instead of blocking startup.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::sqlite_persistence::{open_database, open_in_memory, SchemaVersion};

/// Key for the signed-in session token.
pub const KEY_SESSION: &str = "session";
/// Key for the studio flow snapshot.
pub const KEY_STUDIO: &str = "studio";

const STATE_SCHEMAS: &[SchemaVersion] = &[SchemaVersion {
    version: 1,
    ddl: "CREATE TABLE app_state (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL,
              updated_at INTEGER NOT NULL
          );",
}];

/// Storage for fixed-key JSON state.
pub trait StateStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn put_raw(&self, key: &str, value: &str) -> Result<()>;
    /// Remove one key. Returns true if it existed.
    fn remove(&self, key: &str) -> Result<bool>;
}

impl dyn StateStore {
    /// Read and deserialize a value; unparseable JSON counts as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, "discarding unparseable stored state: {}", e);
                Ok(None)
            }
        }
    }

    /// Serialize and store a value.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).context("Failed to serialize state")?;
        self.put_raw(key, &raw)
    }
}

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path, STATE_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory(STATE_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl StateStore for SqliteStateStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM app_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to read state")
    }

    fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO app_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().timestamp()],
        )
        .context("Failed to write state")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM app_state WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}
