//! Data models for captures and the handle being archived.
//!
//! - [`CaptureRecord`]: one archived snapshot, keyed by its content digest
//! - [`Handle`]: the validated account identifier a run is scoped to
//!
//! The store and the CSV export both use the `wm*` column names that the
//! Wayback Machine index uses, so a record reads the same in SQLite, in the
//! CSV file, and in the index response it came from.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::{ArchiveError, Result};

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("handle pattern is valid"));

/// One archived snapshot of a status URL.
///
/// `author` and `text` start out empty and are filled in exactly once by the
/// snapshot scraper. A record with both set is complete and is never fetched
/// again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// SURT-normalized source URL (`com,twitter)/notch/status/1`).
    pub url_key: String,
    /// Capture time as `YYYYMMDDhhmmss`.
    pub timestamp: i64,
    /// The live URL at capture time.
    pub original_url: String,
    pub mimetype: String,
    /// HTTP status at capture time; the index reports `-` for some captures.
    pub status_code: Option<u16>,
    /// Content hash, the identity of the record.
    pub digest: String,
    pub length: Option<i64>,
    /// Author handle as rendered on the snapshot, e.g. `@Notch`.
    pub author: Option<String>,
    pub text: Option<String>,
}

impl CaptureRecord {
    pub fn is_complete(&self) -> bool {
        self.author.is_some() && self.text.is_some()
    }

    /// Capture time, when the timestamp is a well-formed 14-digit value.
    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp.to_string(), "%Y%m%d%H%M%S").ok()
    }
}

/// The account a run archives posts for.
///
/// Keeps the casing the user typed (it names the database and CSV files) and
/// compares case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle(String);

impl Handle {
    /// Strip surrounding whitespace and one leading `@`, then validate.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if !HANDLE_RE.is_match(bare) {
            return Err(ArchiveError::InvalidHandle(raw.to_string()));
        }
        Ok(Self(bare.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    /// Whether an author string scraped from a page names this handle.
    pub fn matches_author(&self, author: &str) -> bool {
        normalize_author(author) == self.normalized()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `"  @Notch "` -> `"notch"`.
pub fn normalize_author(author: &str) -> String {
    let trimmed = author.trim();
    trimmed
        .strip_prefix('@')
        .unwrap_or(trimmed)
        .trim()
        .to_lowercase()
}
