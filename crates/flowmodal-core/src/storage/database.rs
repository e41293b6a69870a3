//! SQLite-backed storage tiers.
//!
//! A file database serves the `local` tier; an in-memory database serves the
//! `session` tier for as long as the flow holding it lives. Both keep flow
//! state in a single `flow_state` table keyed by `(namespace, key)`. Values
//! are JSON text; expiry is an epoch-millisecond column interpreted by the
//! cascade above this tier.

use std::path::Path;

use rusqlite::{params, Connection};

use super::{StorageBackend, StorageTier, StoredEntry};
use crate::error::StorageError;

/// File name of the durable store inside the data directory.
pub const DATABASE_FILE: &str = "flowmodal.db";

/// SQLite database holding persisted flow state.
pub struct Database {
    conn: Connection,
    tier: StorageTier,
}

impl Database {
    /// Open (or create) the database at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn,
            tier: StorageTier::Local,
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            tier: StorageTier::Session,
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS flow_state (
                namespace  TEXT NOT NULL,
                key        TEXT NOT NULL,
                value      TEXT NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (namespace, key)
            );

            CREATE INDEX IF NOT EXISTS idx_flow_state_expires_at ON flow_state(expires_at);",
        )?;
        Ok(())
    }

    /// Number of live rows in a namespace, expired or not.
    pub fn count(&self, namespace: &str) -> Result<u64, StorageError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM flow_state WHERE namespace = ?1",
            params![namespace],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }

    /// Delete every row whose expiry is at or before `now`.
    pub fn purge_expired(&self, now: u64) -> Result<usize, StorageError> {
        let removed = self.conn.execute(
            "DELETE FROM flow_state WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now as i64],
        )?;
        Ok(removed)
    }
}

impl StorageBackend for Database {
    fn tier(&self) -> StorageTier {
        self.tier
    }

    fn read(&self, namespace: &str, key: &str) -> Result<Option<StoredEntry>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value, expires_at FROM flow_state WHERE namespace = ?1 AND key = ?2")?;
        let result = stmt.query_row(params![namespace, key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
        });
        match result {
            Ok((value, expires_at)) => Ok(Some(StoredEntry {
                value: serde_json::from_str(&value)?,
                expires_at: expires_at.map(|at| at.max(0) as u64),
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, entry: &StoredEntry) -> Result<(), StorageError> {
        let value = serde_json::to_string(&entry.value)?;
        let expires_at = entry.expires_at.map(|at| i64::try_from(at).unwrap_or(i64::MAX));
        self.conn.execute(
            "INSERT OR REPLACE INTO flow_state (namespace, key, value, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![namespace, key, value, expires_at],
        )?;
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM flow_state WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }

    fn clear(&mut self, namespace: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM flow_state WHERE namespace = ?1", params![namespace])?;
        Ok(())
    }
}
