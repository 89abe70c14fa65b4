//! CSV export of the capture store.
//!
//! One row per stored capture, complete or not, with the store's columns in
//! order followed by `wmLink`, the replay URL of the capture.

use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::config::Endpoints;
use crate::error::{ArchiveError, Result};
use crate::models::CaptureRecord;

/// A capture as written to the CSV file. Field order is column order.
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    #[serde(rename = "wmUrlKey")]
    pub url_key: &'a str,
    #[serde(rename = "wmTimestamp")]
    pub timestamp: i64,
    #[serde(rename = "wmOriginal")]
    pub original_url: &'a str,
    #[serde(rename = "wmMimetype")]
    pub mimetype: &'a str,
    #[serde(rename = "wmStatusCode")]
    pub status_code: Option<u16>,
    #[serde(rename = "wmDigest")]
    pub digest: &'a str,
    #[serde(rename = "wmLength")]
    pub length: Option<i64>,
    pub username: Option<&'a str>,
    pub text: Option<&'a str>,
    #[serde(rename = "wmLink")]
    pub link: String,
}

/// Attach the derived replay link to every record.
pub fn export_rows<'a>(records: &'a [CaptureRecord], endpoints: &Endpoints) -> Vec<ExportRow<'a>> {
    records
        .iter()
        .map(|r| ExportRow {
            url_key: &r.url_key,
            timestamp: r.timestamp,
            original_url: &r.original_url,
            mimetype: &r.mimetype,
            status_code: r.status_code,
            digest: &r.digest,
            length: r.length,
            username: r.author.as_deref(),
            text: r.text.as_deref(),
            link: endpoints.snapshot_url(r.timestamp, &r.original_url),
        })
        .collect()
}

/// Encode rows as CSV with a header line.
///
/// # Errors
///
/// [`ArchiveError::Export`] when there are no rows (there is no first row to
/// take the header from) or the encoder fails.
pub fn encode_rows(rows: &[ExportRow<'_>]) -> Result<String> {
    if rows.is_empty() {
        return Err(ArchiveError::Export("no captures to export".to_string()));
    }

    let mut writer = ::csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ArchiveError::Export(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ArchiveError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ArchiveError::Export(e.to_string()))
}

/// Write the CSV export of `records` to `path`.
///
/// # Arguments
///
/// * `path` - Destination file, overwritten if present
/// * `records` - Rows in export order
/// * `endpoints` - Used to derive each row's `wmLink`
///
/// # Errors
///
/// [`ArchiveError::Export`] when there is nothing to export, encoding fails,
/// or the file cannot be written.
#[instrument(level = "info", skip_all, fields(path = %path.display(), records = records.len()))]
pub async fn write_csv(path: &Path, records: &[CaptureRecord], endpoints: &Endpoints) -> Result<()> {
    let rows = export_rows(records, endpoints);
    let encoded = encode_rows(&rows)?;
    fs::write(path, encoded)
        .await
        .map_err(|e| ArchiveError::Export(format!("cannot write {}: {e}", path.display())))?;
    info!("Wrote CSV export");
    Ok(())
}
