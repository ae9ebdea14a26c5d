//! The storage adapter: a thin key/value interface over a single-table
//! SQLite-backed relational store.
//!
//! `Db` is a cheaply cloneable handle wrapping a `sqlx::SqlitePool`,
//! opened once at startup and shared across every connection. A pool
//! already serializes and multiplexes statements safely for concurrent
//! callers, so one handle is shared rather than opening a dedicated
//! connection per client.

use std::path::Path;

use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, SqlitePool};
use tracing::debug;

use crate::error::Result;

/// One persisted `(key, flags, bytes, dataBlock)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub flags: u16,
    pub bytes: i64,
    pub data_block: Vec<u8>,
}

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Opens (creating if absent) the SQLite file at `database_file` and
    /// ensures the `keysTable` schema exists.
    pub async fn open(database_file: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_file)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS keysTable (\
                key TEXT PRIMARY KEY, \
                flags INTEGER NOT NULL, \
                bytes INTEGER, \
                dataBlock BLOB \
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Atomic insert-or-replace by primary key.
    pub async fn upsert(&self, key: &[u8], flags: u16, bytes: usize, data_block: &[u8]) -> Result<()> {
        let key = String::from_utf8_lossy(key).into_owned();
        sqlx::query(
            "INSERT OR REPLACE INTO keysTable (key, flags, bytes, dataBlock) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(flags as i64)
        .bind(bytes as i64)
        .bind(data_block)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the subset of `keys` that exist, in the order the store
    /// returns them (its natural `IN (...)` order, not request order).
    pub async fn multi_get(&self, keys: &[Bytes]) -> Result<Vec<Entry>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::new(
            "SELECT key, flags, bytes, dataBlock FROM keysTable WHERE key IN (",
        );
        {
            let mut separated = builder.separated(", ");
            for key in keys {
                separated.push_bind(String::from_utf8_lossy(key).into_owned());
            }
        }
        builder.push(")");

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let flags: i64 = row.try_get("flags")?;
            let bytes: i64 = row.try_get("bytes")?;
            let data_block: Vec<u8> = row.try_get("dataBlock")?;
            entries.push(Entry {
                key: key.into_bytes(),
                flags: flags as u16,
                bytes,
                data_block,
            });
        }

        debug!(found = entries.len(), requested = keys.len(), "multi_get");
        Ok(entries)
    }

    /// Deletes `key`, returning the number of rows removed (0 or 1).
    pub async fn delete(&self, key: &[u8]) -> Result<u64> {
        let key = String::from_utf8_lossy(key).into_owned();
        let result = sqlx::query("DELETE FROM keysTable WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Full table scan, used by the (external) monitoring reader.
    pub async fn list_all(&self) -> Result<Vec<Entry>> {
        let rows = sqlx::query("SELECT key, flags, bytes, dataBlock FROM keysTable")
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let flags: i64 = row.try_get("flags")?;
            let bytes: i64 = row.try_get("bytes")?;
            let data_block: Vec<u8> = row.try_get("dataBlock")?;
            entries.push(Entry {
                key: key.into_bytes(),
                flags: flags as u16,
                bytes,
                data_block,
            });
        }

        Ok(entries)
    }
}
