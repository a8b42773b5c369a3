//! SQLite-backed blob store for cached audio.
//!
//! One object table, key → blob. No expiration and no eviction: the cache
//! grows until the user clears it explicitly.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::sqlite_persistence::{open_database, open_in_memory, SchemaVersion};

const MEDIA_CACHE_SCHEMAS: &[SchemaVersion] = &[SchemaVersion {
    version: 1,
    ddl: "CREATE TABLE audio_cache (
              key TEXT PRIMARY KEY,
              content_type TEXT,
              data BLOB NOT NULL,
              size INTEGER NOT NULL,
              created_at INTEGER NOT NULL
          );",
}];

/// A cached media entry.
#[derive(Debug, Clone)]
pub struct CachedMedia {
    pub key: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub created_at: i64,
}

/// Aggregate cache statistics for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Storage for cached media blobs.
pub trait MediaCacheStore: Send + Sync {
    /// Look up a blob by key.
    fn get(&self, key: &str) -> Result<Option<CachedMedia>>;

    /// Store a blob under a key, replacing any previous entry.
    fn put(&self, key: &str, content_type: Option<&str>, data: &[u8]) -> Result<()>;

    /// Remove one entry. Returns true if it existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Entry count and total payload size.
    fn stats(&self) -> Result<CacheStats>;

    /// Drop every entry. Returns the number of entries removed.
    fn clear(&self) -> Result<usize>;
}

/// SQLite-backed media cache store.
pub struct SqliteMediaCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMediaCacheStore {
    /// Open an existing cache database or create a new one.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path, MEDIA_CACHE_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory(MEDIA_CACHE_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl MediaCacheStore for SqliteMediaCacheStore {
    fn get(&self, key: &str) -> Result<Option<CachedMedia>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT key, content_type, data, created_at FROM audio_cache WHERE key = ?1",
            params![key],
            |row| {
                Ok(CachedMedia {
                    key: row.get(0)?,
                    content_type: row.get(1)?,
                    data: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .context("Failed to read cache entry")
    }

    fn put(&self, key: &str, content_type: Option<&str>, data: &[u8]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO audio_cache (key, content_type, data, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key,
                content_type,
                data,
                data.len() as i64,
                chrono::Utc::now().timestamp()
            ],
        )
        .context("Failed to write cache entry")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM audio_cache WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn stats(&self) -> Result<CacheStats> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM audio_cache",
            [],
            |row| {
                Ok(CacheStats {
                    entries: row.get::<_, i64>(0)? as usize,
                    total_bytes: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .context("Failed to read cache stats")
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM audio_cache", [])?;
        Ok(removed)
    }
}
