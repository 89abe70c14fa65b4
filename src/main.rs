//! # Wayback Tweets
//!
//! Archives every post of a Twitter handle that the Wayback Machine captured,
//! keeps them in a per-handle SQLite database, and exports them to CSV.
//!
//! ## Usage
//!
//! ```sh
//! wayback_tweets @Notch
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Indexing**: list every capture of `twitter.com/<handle>/status/*`
//! 2. **Import**: add unseen captures to the store, deduplicated by digest
//! 3. **Fetching**: scrape author and text from each pending capture, one
//!    request at a time
//! 4. **Output**: write the whole store to `<handle>.csv`
//!
//! Re-running for the same handle only fetches captures that are new or that
//! failed last time.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod store;
mod utils;

#[cfg(test)]
mod testing;

use api::{HttpFetcher, RetryPolicy};
use cli::Cli;
use config::Config;
use ingest::Pacing;
use models::Handle;
use pipeline::{RunContext, archive_handle};
use store::Store;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let handle = Handle::parse(&args.handle)?;
    info!(%handle, "wayback_tweets starting up");

    let config = Config::load(args.config.as_deref()).await?.apply_cli(&args);
    debug!(?config, "Effective configuration");
    let endpoints = config.endpoints()?;

    for dir in [&args.db_dir, &args.output_dir] {
        if let Err(e) = ensure_writable_dir(Path::new(dir)).await {
            error!(path = %dir, error = %e, "Directory is not writable (fix perms or choose a different path)");
            return Err(e.into());
        }
    }

    let store = Store::open_for_handle(&args.db_dir, &handle)?;
    let fetcher = HttpFetcher::new(&config)?;
    let ctx = RunContext::new(&store, &handle, &fetcher, &endpoints)
        .with_index_retry(RetryPolicy::new(config.index_retries));
    let pacing = Pacing::new(config.request_delay());

    let summary = archive_handle(&ctx, &pacing, Path::new(&args.output_dir)).await?;

    if let Some(e) = &summary.export_error {
        warn!(error = %e, "Run finished without a CSV export");
    }

    let elapsed = start_time.elapsed();
    info!(
        stored = summary.stored,
        complete = summary.complete,
        fetched = summary.ingest.fetched,
        failed = summary.ingest.failed,
        rejected = summary.ingest.rejected,
        csv = %summary.csv_path.display(),
        ?elapsed,
        secs = elapsed.as_secs(),
        "Done!"
    );

    Ok(())
}
