//! Wayback Machine CDX index: discover every capture of a handle's statuses.
//!
//! # Response Shape
//!
//! With `output=json` the CDX server answers with an array of string arrays.
//! The first row names the columns and every following row is one capture:
//!
//! ```json
//! [["urlkey","timestamp","original","mimetype","statuscode","digest","length"],
//!  ["com,twitter)/notch/status/1","20200101000000","https://twitter.com/notch/status/1",
//!   "text/html","200","AAAA","1234"]]
//! ```
//!
//! A handle without captures yields `[]`. The query is not paginated, so a
//! server-side result cap silently truncates the list.

use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::api::{Fetcher, RetryFetch, RetryPolicy};
use crate::config::Endpoints;
use crate::error::{ArchiveError, Result};
use crate::models::{CaptureRecord, Handle};
use crate::pipeline::RunContext;

/// Fetch and decode the capture index for `handle`.
///
/// # Arguments
///
/// * `fetcher` - Transport for the index request
/// * `endpoints` - Where the CDX server lives
/// * `handle` - Account whose `status/*` captures are listed
/// * `retry` - Backoff applied to this request only
///
/// # Errors
///
/// [`ArchiveError::Remote`] when the request keeps failing or the body is not
/// a well-formed CDX JSON table.
#[instrument(level = "info", skip_all, fields(%handle))]
pub async fn fetch_index<F: Fetcher>(
    fetcher: &F,
    endpoints: &Endpoints,
    handle: &Handle,
    retry: RetryPolicy,
) -> Result<Vec<CaptureRecord>> {
    let url = endpoints.index_url(handle)?;
    let body = RetryFetch::new(fetcher, retry).fetch(&url).await?;
    let records = parse_index(&url, &body)?;
    info!(count = records.len(), "Fetched capture index");
    Ok(records)
}

/// Merge the remote index into the store and return the store's full listing.
///
/// Records are keyed by digest: content already stored (under any timestamp or
/// URL) is skipped, and existing rows are never modified.
#[instrument(level = "info", skip_all, fields(handle = %ctx.handle))]
pub async fn import_captures<F: Fetcher>(ctx: &RunContext<'_, F>) -> Result<Vec<CaptureRecord>> {
    let fetched = fetch_index(ctx.fetcher, ctx.endpoints, ctx.handle, ctx.index_retry).await?;
    let distinct = fetched.iter().unique_by(|r| r.digest.clone()).count();
    let inserted = ctx.store.import(&fetched)?;

    let all = ctx.store.list_all()?;
    info!(
        fetched = fetched.len(),
        distinct,
        inserted,
        stored = all.len(),
        "Imported captures"
    );
    Ok(all)
}

/// Decode a CDX JSON body. `url` is only used for error reporting.
pub fn parse_index(url: &str, body: &[u8]) -> Result<Vec<CaptureRecord>> {
    let rows: Vec<Vec<String>> = serde_json::from_slice(body)
        .map_err(|e| malformed(url, format!("not a JSON array of string arrays: {e}")))?;

    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        debug!("Index response is empty");
        return Ok(Vec::new());
    };
    let columns = Columns::from_header(url, &header)?;

    rows.enumerate()
        .map(|(i, row)| {
            if row.len() != header.len() {
                return Err(malformed(
                    url,
                    format!(
                        "row {} has {} cells, header has {}",
                        i + 1,
                        row.len(),
                        header.len()
                    ),
                ));
            }
            columns.record(url, i + 1, &row)
        })
        .collect()
}

/// Column positions resolved from the header row.
struct Columns {
    positions: HashMap<String, usize>,
}

impl Columns {
    const REQUIRED: [&'static str; 3] = ["timestamp", "original", "digest"];

    fn from_header(url: &str, header: &[String]) -> Result<Self> {
        let positions: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        if let Some(missing) = Self::REQUIRED.iter().find(|c| !positions.contains_key(**c)) {
            return Err(malformed(url, format!("header has no {missing:?} column")));
        }
        Ok(Self { positions })
    }

    fn cell<'r>(&self, row: &'r [String], name: &str) -> Option<&'r str> {
        self.positions
            .get(name)
            .and_then(|&i| row.get(i))
            .map(String::as_str)
    }

    fn record(&self, url: &str, line: usize, row: &[String]) -> Result<CaptureRecord> {
        let text = |name: &str| self.cell(row, name).unwrap_or_default().to_string();

        let raw_timestamp = self.cell(row, "timestamp").unwrap_or_default();
        let timestamp = raw_timestamp.parse::<i64>().map_err(|_| {
            malformed(url, format!("row {line} has non-numeric timestamp {raw_timestamp:?}"))
        })?;

        Ok(CaptureRecord {
            url_key: text("urlkey"),
            timestamp,
            original_url: text("original"),
            mimetype: text("mimetype"),
            status_code: self.cell(row, "statuscode").and_then(|s| s.parse().ok()),
            digest: text("digest"),
            length: self.cell(row, "length").and_then(|s| s.parse().ok()),
            author: None,
            text: None,
        })
    }
}

fn malformed(url: &str, detail: String) -> ArchiveError {
    ArchiveError::remote(url, format!("malformed index response: {detail}"))
}
