//! Per-handle SQLite store of captures.
//!
//! One table, keyed by content digest. Rows are inserted once by the importer
//! and updated once by the scraper; nothing is ever deleted, so re-running the
//! pipeline for a handle only adds new captures and fills in missing text.

use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::error::{ArchiveError, Result};
use crate::models::{CaptureRecord, Handle};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "Captures" (
    "wmUrlKey"      TEXT,
    "wmTimestamp"   INTEGER,
    "wmOriginal"    TEXT,
    "wmMimetype"    TEXT,
    "wmStatusCode"  INTEGER,
    "wmDigest"      TEXT,
    "wmLength"      INTEGER,
    "username"      TEXT,
    "text"          TEXT,
    PRIMARY KEY("wmDigest")
);
"#;

const COLUMNS: &str =
    "wmUrlKey, wmTimestamp, wmOriginal, wmMimetype, wmStatusCode, wmDigest, wmLength, username, text";

const INSERT_IF_ABSENT: &str = "INSERT OR IGNORE INTO Captures \
     (wmUrlKey, wmTimestamp, wmOriginal, wmMimetype, wmStatusCode, wmDigest, wmLength) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and make sure the schema exists.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;
        info!("Opened capture store");
        Ok(store)
    }

    /// `<dir>/<handle>.sqlite`
    pub fn open_for_handle(dir: impl AsRef<Path>, handle: &Handle) -> Result<Self> {
        Self::open(Self::path_for_handle(dir, handle))
    }

    pub fn path_for_handle(dir: impl AsRef<Path>, handle: &Handle) -> PathBuf {
        dir.as_ref().join(format!("{}.sqlite", handle.as_str()))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert `record` unless its digest is already stored. Never overwrites.
    ///
    /// Returns whether a row was inserted.
    pub fn upsert_if_absent(&self, record: &CaptureRecord) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(INSERT_IF_ABSENT)?;
        let changed = stmt.execute(params![
            record.url_key,
            record.timestamp,
            record.original_url,
            record.mimetype,
            record.status_code,
            record.digest,
            record.length,
        ])?;
        Ok(changed == 1)
    }

    /// Insert every record whose digest is new, all in one transaction.
    ///
    /// Either every new record lands or none does: an error part-way through
    /// drops the transaction, which rolls back the earlier inserts.
    ///
    /// # Returns
    ///
    /// How many rows were added.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Database`] if any insert or the commit fails.
    #[instrument(level = "info", skip_all, fields(records = records.len()))]
    pub fn import(&self, records: &[CaptureRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        for record in records {
            if self.upsert_if_absent(record)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        debug!(inserted, "Committed capture import");
        Ok(inserted)
    }

    /// Look up one capture by digest.
    ///
    /// # Returns
    ///
    /// `None` when no row has that digest; absence is not an error here.
    pub fn get(&self, digest: &str) -> Result<Option<CaptureRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM Captures WHERE wmDigest = ?1");
        let record = self
            .conn
            .query_row(&sql, params![digest], from_row)
            .optional()?;
        Ok(record)
    }

    /// Record the scraped author and text for an existing capture.
    pub fn mark_complete(&self, digest: &str, author: &str, text: &str) -> Result<CaptureRecord> {
        let changed = self.conn.execute(
            "UPDATE Captures SET username = ?1, text = ?2 WHERE wmDigest = ?3",
            params![author, text, digest],
        )?;
        if changed == 0 {
            return Err(ArchiveError::NotFound(digest.to_string()));
        }
        self.get(digest)?
            .ok_or_else(|| ArchiveError::NotFound(digest.to_string()))
    }

    /// Every capture, in insertion order.
    ///
    /// Completed and pending rows alike; the ingestion loop relies on the
    /// completeness of each row to skip work.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Database`] if the query or a row conversion fails.
    pub fn list_all(&self) -> Result<Vec<CaptureRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM Captures ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `(total, complete)` row counts.
    pub fn completion_counts(&self) -> Result<(usize, usize)> {
        let counts = self.conn.query_row(
            "SELECT COUNT(*), \
                    COUNT(CASE WHEN username IS NOT NULL AND text IS NOT NULL THEN 1 END) \
             FROM Captures",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        Ok((counts.0 as usize, counts.1 as usize))
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<CaptureRecord> {
    Ok(CaptureRecord {
        url_key: row.get(0)?,
        timestamp: row.get(1)?,
        original_url: row.get(2)?,
        mimetype: row.get(3)?,
        status_code: row.get(4)?,
        digest: row.get(5)?,
        length: row.get(6)?,
        author: row.get(7)?,
        text: row.get(8)?,
    })
}
