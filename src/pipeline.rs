//! One archiving run for one handle: import, ingest, export.
//!
//! ```text
//! CDX index ──▶ import_captures ──▶ Store ──▶ ingest::run ──▶ Store ──▶ write_csv
//!                                     ▲          │
//!                                     └ scrape_capture (one request at a time)
//! ```
//!
//! Index and store failures abort the run. Per-capture failures are absorbed
//! by the ingestion loop, and an export failure is reported in the
//! [`RunSummary`] without failing the run.

use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

use crate::api::{Fetcher, RetryPolicy};
use crate::config::Endpoints;
use crate::error::{ArchiveError, Result};
use crate::ingest::{self, IngestStats, Pacing};
use crate::models::Handle;
use crate::outputs::csv::write_csv;
use crate::scrapers::cdx::import_captures;
use crate::store::Store;

/// Everything a component needs for the current run, passed explicitly.
#[derive(Debug)]
pub struct RunContext<'a, F> {
    pub store: &'a Store,
    pub handle: &'a Handle,
    pub fetcher: &'a F,
    pub endpoints: &'a Endpoints,
    /// Applied to the index request only.
    pub index_retry: RetryPolicy,
}

impl<'a, F: Fetcher> RunContext<'a, F> {
    pub fn new(
        store: &'a Store,
        handle: &'a Handle,
        fetcher: &'a F,
        endpoints: &'a Endpoints,
    ) -> Self {
        Self {
            store,
            handle,
            fetcher,
            endpoints,
            index_retry: RetryPolicy::none(),
        }
    }

    pub fn with_index_retry(mut self, policy: RetryPolicy) -> Self {
        self.index_retry = policy;
        self
    }
}

/// Outcome of [`archive_handle`].
#[derive(Debug)]
pub struct RunSummary {
    pub ingest: IngestStats,
    /// Rows in the store after the run.
    pub stored: usize,
    /// Rows with author and text after the run.
    pub complete: usize,
    pub csv_path: PathBuf,
    /// Set when the CSV could not be written; the store is unaffected.
    pub export_error: Option<ArchiveError>,
}

/// Import the index, scrape every pending capture, and export the store to
/// `<output_dir>/<handle>.csv`.
///
/// # Errors
///
/// Index and store failures abort the run. Per-capture failures only show up
/// in [`RunSummary::ingest`], and an export failure in
/// [`RunSummary::export_error`].
#[instrument(level = "info", skip_all, fields(handle = %ctx.handle))]
pub async fn archive_handle<F: Fetcher>(
    ctx: &RunContext<'_, F>,
    pacing: &Pacing,
    output_dir: &Path,
) -> Result<RunSummary> {
    info!("Fetching Wayback Machine captures for @{}", ctx.handle);
    let captures = import_captures(ctx).await?;
    info!(count = captures.len(), "Captures to process");

    let ingest = ingest::run(ctx, &captures, pacing).await;

    // Fresh read so the export reflects every scrape from this run.
    let records = ctx.store.list_all()?;
    let (stored, complete) = ctx.store.completion_counts()?;

    let csv_path = output_dir.join(format!("{}.csv", ctx.handle));
    let export_error = match write_csv(&csv_path, &records, ctx.endpoints).await {
        Ok(()) => None,
        Err(e) => {
            error!(path = %csv_path.display(), kind = e.kind(), error = %e, "CSV export failed");
            Some(e)
        }
    };

    Ok(RunSummary {
        ingest,
        stored,
        complete,
        csv_path,
        export_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, permalink_page};

    fn handle() -> Handle {
        Handle::parse("notch").unwrap()
    }

    fn index_body() -> String {
        r#"[["urlkey","timestamp","original","mimetype","statuscode","digest","length"],
            ["com,twitter)/notch/status/1","20100101120000","https://twitter.com/notch/status/1","text/html","200","D1","10"],
            ["com,twitter)/notch/status/1","20110101120000","https://twitter.com/notch/status/1","text/html","200","D1","10"],
            ["com,twitter)/notch/status/2","20100202120000","https://twitter.com/notch/status/2","text/html","200","D2","10"],
            ["com,twitter)/notch/status/3","20100303120000","https://twitter.com/notch/status/3","text/html","200","D3","10"]]"#
            .to_string()
    }

    fn fetcher(endpoints: &Endpoints) -> FakeFetcher {
        FakeFetcher::new()
            .respond(endpoints.index_url(&handle()).unwrap(), index_body())
            .respond(
                endpoints.snapshot_url(20100101120000, "https://twitter.com/notch/status/1"),
                permalink_page("notch", "one"),
            )
            .respond(
                endpoints.snapshot_url(20100202120000, "https://twitter.com/notch/status/2"),
                permalink_page("notch", "two"),
            )
            .fail(
                endpoints.snapshot_url(20100303120000, "https://twitter.com/notch/status/3"),
                "HTTP 503 Service Unavailable",
            )
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let endpoints = Endpoints::default();
        let handle = handle();

        let first_fetcher = fetcher(&endpoints);
        let ctx = RunContext::new(&store, &handle, &first_fetcher, &endpoints);
        let first = archive_handle(&ctx, &Pacing::none(), dir.path()).await.unwrap();
        assert_eq!(first.stored, 3);
        assert_eq!(first.complete, 2);
        assert_eq!(first.ingest.fetched, 2);
        assert_eq!(first.ingest.failed, 1);
        let after_first = store.list_all().unwrap();

        let second_fetcher = fetcher(&endpoints);
        let ctx = RunContext::new(&store, &handle, &second_fetcher, &endpoints);
        let second = archive_handle(&ctx, &Pacing::none(), dir.path()).await.unwrap();
        assert_eq!(store.list_all().unwrap(), after_first);
        assert_eq!(second.ingest.cached, 2);
        assert_eq!(second.ingest.fetched, 0);

        // Only the index and the still-pending capture were requested again.
        assert_eq!(second_fetcher.calls().len(), 2);
        assert_eq!(
            second_fetcher.call_count(
                &endpoints.snapshot_url(20100303120000, "https://twitter.com/notch/status/3")
            ),
            1
        );
    }

    #[tokio::test]
    async fn test_export_reflects_scraped_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let endpoints = Endpoints::default();
        let handle = handle();
        let fetcher = fetcher(&endpoints);
        let ctx = RunContext::new(&store, &handle, &fetcher, &endpoints);

        let summary = archive_handle(&ctx, &Pacing::none(), dir.path()).await.unwrap();
        assert!(summary.export_error.is_none());
        assert_eq!(summary.csv_path, dir.path().join("notch.csv"));

        let csv = std::fs::read_to_string(&summary.csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains(",@notch,one,"));
        assert!(lines[3].ends_with(
            ",,,https://web.archive.org/web/20100303120000/https://twitter.com/notch/status/3"
        ));
    }

    #[tokio::test]
    async fn test_empty_index_completes_with_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let endpoints = Endpoints::default();
        let handle = handle();
        let fetcher = FakeFetcher::new().respond(endpoints.index_url(&handle).unwrap(), "[]");
        let ctx = RunContext::new(&store, &handle, &fetcher, &endpoints);

        let summary = archive_handle(&ctx, &Pacing::none(), dir.path()).await.unwrap();
        assert_eq!(summary.ingest, IngestStats::default());
        assert_eq!(summary.stored, 0);
        assert!(matches!(summary.export_error, Some(ArchiveError::Export(_))));
        assert!(!summary.csv_path.exists());
    }

    #[tokio::test]
    async fn test_index_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let endpoints = Endpoints::default();
        let handle = handle();
        let fetcher = FakeFetcher::new();
        let ctx = RunContext::new(&store, &handle, &fetcher, &endpoints)
            .with_index_retry(RetryPolicy { max_retries: 1, ..RetryPolicy::none() });

        let err = archive_handle(&ctx, &Pacing::none(), dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), "remote");
        assert_eq!(fetcher.calls().len(), 2);
    }
}
