//! Sequential ingestion of pending captures.
//!
//! Captures are scraped one at a time, each request fully awaited before the
//! next starts, with a short randomized pause after every remote fetch. The
//! Wayback Machine rate-limits aggressive clients, so this loop must never be
//! made concurrent.
//!
//! A failed capture is logged with its URL and left incomplete in the store;
//! the next run retries it automatically.

use rand::{Rng, rng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::api::Fetcher;
use crate::error::ArchiveError;
use crate::models::CaptureRecord;
use crate::pipeline::RunContext;
use crate::scrapers::snapshot::scrape_capture;

/// Pause inserted after every capture that hit the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub delay: Duration,
    pub max_jitter_ms: u64,
}

impl Pacing {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_jitter_ms: 250,
        }
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            delay: Duration::ZERO,
            max_jitter_ms: 0,
        }
    }

    async fn pause(&self) {
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter_ms);
        let pause = self.delay + Duration::from_millis(jitter_ms);
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }
}

/// Per-run tallies of the ingestion loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub total: usize,
    /// Already complete before this run; no request made.
    pub cached: usize,
    /// Fetched and completed during this run.
    pub fetched: usize,
    /// Remote, parse, extraction or store failures.
    pub failed: usize,
    /// Snapshots whose author was not the archived handle.
    pub rejected: usize,
}

/// Scrape every record in order, isolating per-record failures.
///
/// Each failure is logged with the capture's URL and timestamp and counted;
/// the loop always runs to the end of `records`.
///
/// # Arguments
///
/// * `ctx` - The run's store, handle, fetcher and endpoints
/// * `records` - Captures to process, in processing order
/// * `pacing` - Pause applied after every capture that hit the network,
///   except the last one
///
/// # Returns
///
/// Tallies of cached, fetched, failed and rejected captures.
#[instrument(level = "info", skip_all, fields(handle = %ctx.handle, total = records.len()))]
pub async fn run<F: Fetcher>(
    ctx: &RunContext<'_, F>,
    records: &[CaptureRecord],
    pacing: &Pacing,
) -> IngestStats {
    let total = records.len();
    let mut stats = IngestStats {
        total,
        ..IngestStats::default()
    };

    for (i, record) in records.iter().enumerate() {
        let position = i + 1;
        info!(
            position,
            total,
            url = %record.original_url,
            captured_at = ?record.captured_at(),
            "fetching {position}/{total}"
        );

        let hit_network = match scrape_capture(ctx, record).await {
            Ok(outcome) => {
                let fetched = outcome.was_fetched();
                if fetched {
                    stats.fetched += 1;
                } else {
                    stats.cached += 1;
                }
                let record = outcome.into_record();
                debug!(digest = %record.digest, author = ?record.author, fetched, "Capture complete");
                fetched
            }
            Err(e) => {
                report_failure(record, &e, &mut stats);
                !matches!(e, ArchiveError::NotFound(_) | ArchiveError::Database(_))
            }
        };

        if hit_network && position < total {
            pacing.pause().await;
        }
    }

    info!(
        total = stats.total,
        cached = stats.cached,
        fetched = stats.fetched,
        failed = stats.failed,
        rejected = stats.rejected,
        "Done fetching captures"
    );
    stats
}

fn report_failure(record: &CaptureRecord, e: &ArchiveError, stats: &mut IngestStats) {
    let snapshot = record.timestamp;
    match e {
        ArchiveError::Validation { .. } => {
            stats.rejected += 1;
            warn!(
                url = %record.original_url,
                digest = %record.digest,
                snapshot,
                kind = e.kind(),
                error = %e,
                "Snapshot belongs to another author; skipping"
            );
        }
        _ => {
            stats.failed += 1;
            error!(
                url = %record.original_url,
                digest = %record.digest,
                snapshot,
                kind = e.kind(),
                error = %e,
                "Failed to fetch capture"
            );
        }
    }
}
