use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

/// SQLite-backed store of successful GET responses, keyed by URL.
pub struct HttpCache {
    conn: Connection,
    expire_after: Option<i64>,
}

impl HttpCache {
    pub fn open(path: &Path, expire_after: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn, expire_after)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, expire_after: Option<u64>) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS responses (
                url        TEXT PRIMARY KEY,
                status     INTEGER NOT NULL,
                body       BLOB NOT NULL,
                fetched_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s','now') AS INTEGER))
            );
            ",
        )?;
        Ok(HttpCache {
            conn,
            expire_after: expire_after.map(|s| i64::try_from(s).unwrap_or(i64::MAX)),
        })
    }

    pub fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM responses
                 WHERE url = ?1
                   AND (?2 IS NULL OR CAST(strftime('%s','now') AS INTEGER) - fetched_at <= ?2)",
                rusqlite::params![url, self.expire_after],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        if body.is_some() {
            debug!(url, "cache hit");
        }
        Ok(body)
    }

    pub fn put(&self, url: &str, status: u16, body: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO responses (url, status, body) VALUES (?1, ?2, ?3)",
            rusqlite::params![url, status, body],
        )?;
        Ok(())
    }

    /// Drop every stored response. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM responses", [])?)
    }
}
