//! Shared SQLite plumbing for the local stores.
//!
//! Each store owns one database file. The schema version is tracked in
//! `PRAGMA user_version`; opening a database that is newer than this build
//! supports is an error rather than a silent downgrade.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use tracing::info;

/// One schema revision: DDL to apply when migrating up to `version`.
pub struct SchemaVersion {
    pub version: i64,
    pub ddl: &'static str,
}

/// Open (or create) a database file and bring it to the latest schema.
///
/// # Arguments
/// * `db_path` - Path to the SQLite database file
/// * `schemas` - Ordered schema revisions, version 1 first
pub fn open_database<P: AsRef<Path>>(db_path: P, schemas: &[SchemaVersion]) -> Result<Connection> {
    let existed = db_path.as_ref().exists();
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
    if !existed {
        info!("Created new database at {:?}", db_path.as_ref());
    }
    migrate(conn, schemas)
}

/// Open an in-memory database at the latest schema, for tests.
pub fn open_in_memory(schemas: &[SchemaVersion]) -> Result<Connection> {
    migrate(Connection::open_in_memory()?, schemas)
}

fn migrate(conn: Connection, schemas: &[SchemaVersion]) -> Result<Connection> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let current: i64 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .context("Failed to read database version")?;

    let latest = schemas.last().map(|s| s.version).unwrap_or(0);
    if current > latest {
        bail!(
            "Database version {} is too new (max supported: {})",
            current,
            latest
        );
    }

    for schema in schemas.iter().filter(|s| s.version > current) {
        info!("Migrating database to schema version {}", schema.version);
        conn.execute_batch(schema.ddl)
            .with_context(|| format!("Migration to version {} failed", schema.version))?;
        conn.pragma_update(None, "user_version", schema.version)?;
    }

    Ok(conn)
}
