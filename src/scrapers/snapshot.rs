//! Scrape one archived status page into its author and text.
//!
//! The archive replays the legacy (pre-2020) twitter.com permalink template:
//!
//! ```text
//! .permalink-tweet                  post container
//! ├── .permalink-header
//! │   └── .username                 "@Notch"
//! └── .js-tweet-text-container      post body
//! ```
//!
//! Pages rendered with any other template (deleted posts, login walls, error
//! pages, the post-2020 client) fail extraction and are left incomplete.

use scraper::Html;
use tracing::{debug, info, instrument, trace};

use crate::api::Fetcher;
use crate::error::{ArchiveError, MissingElement, Result};
use crate::models::CaptureRecord;
use crate::pipeline::RunContext;
use crate::scrapers::markup::{MarkupNode, class_contains, find_descendant};
use crate::utils::truncate_for_log;

const POST_CLASS: &str = "permalink-tweet";
const HEADER_CLASS: &str = "permalink-header";
const AUTHOR_CLASS: &str = "username";
const BODY_CLASS: &str = "js-tweet-text-container";

/// Author and body text as they appear on a permalink page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub text: String,
}

/// How [`scrape_capture`] produced its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Already complete in the store; nothing was fetched.
    Cached(CaptureRecord),
    /// Fetched, extracted and persisted during this call.
    Fetched(CaptureRecord),
}

impl ScrapeOutcome {
    pub fn into_record(self) -> CaptureRecord {
        match self {
            Self::Cached(record) | Self::Fetched(record) => record,
        }
    }

    pub fn was_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

/// Fill in author and text for one capture, unless the store already has them.
///
/// A single attempt: errors are returned to the caller, and the record is only
/// written when extraction and author validation both succeed.
///
/// # Arguments
///
/// * `ctx` - The run's store, handle, fetcher and endpoints
/// * `record` - The capture to scrape; only its digest is trusted, the rest
///   is re-read from the store
///
/// # Returns
///
/// [`ScrapeOutcome::Cached`] without any request when the stored row is
/// already complete, otherwise [`ScrapeOutcome::Fetched`] with the updated row.
///
/// # Errors
///
/// `NotFound` when the digest is not stored, `Remote`/`Parse`/`Extraction`
/// from the fetch, and `Validation` when the page belongs to another author.
#[instrument(level = "info", skip_all, fields(digest = %record.digest, url = %record.original_url))]
pub async fn scrape_capture<F: Fetcher>(
    ctx: &RunContext<'_, F>,
    record: &CaptureRecord,
) -> Result<ScrapeOutcome> {
    let current = ctx
        .store
        .get(&record.digest)?
        .ok_or_else(|| ArchiveError::NotFound(record.digest.clone()))?;
    if current.is_complete() {
        debug!("Capture already complete; skipping fetch");
        return Ok(ScrapeOutcome::Cached(current));
    }

    let url = ctx
        .endpoints
        .snapshot_url(current.timestamp, &current.original_url);
    let body = ctx.fetcher.fetch(&url).await?;
    let post = extract_post(&body)?;

    if !ctx.handle.matches_author(&post.author) {
        return Err(ArchiveError::Validation {
            expected: ctx.handle.to_string(),
            found: post.author,
        });
    }

    let updated = ctx
        .store
        .mark_complete(&current.digest, &post.author, &post.text)?;
    info!(
        author = %post.author,
        text = %truncate_for_log(&post.text, 80),
        "Scraped capture"
    );
    Ok(ScrapeOutcome::Fetched(updated))
}

/// Decode and parse a snapshot body, then extract its post.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD rather than
/// rejected; archived pages routinely carry stray Latin-1 bytes.
///
/// # Errors
///
/// * [`ArchiveError::Parse`] - the body is empty or only whitespace
/// * [`ArchiveError::Extraction`] - the page does not follow the permalink
///   template; names the first element that was missing
pub fn extract_post(body: &[u8]) -> Result<Post> {
    let html = String::from_utf8_lossy(body);
    if html.trim().is_empty() {
        return Err(ArchiveError::Parse("body is empty".to_string()));
    }
    let document = Html::parse_document(&html);
    locate_post(&document.root_element()).map_err(|missing| {
        debug!(
            %missing,
            preview = %truncate_for_log(html.trim(), 200),
            "Snapshot does not match the permalink template"
        );
        ArchiveError::Extraction(missing)
    })
}

/// Walk the permalink template starting at the document root.
pub fn locate_post<N: MarkupNode>(root: &N) -> std::result::Result<Post, MissingElement> {
    let post =
        find_descendant(root, &class_contains(POST_CLASS)).ok_or(MissingElement::PostContainer)?;
    trace!(tag = post.tag(), "Found post container");
    let header =
        find_descendant(&post, &class_contains(HEADER_CLASS)).ok_or(MissingElement::Header)?;
    let author =
        find_descendant(&header, &class_contains(AUTHOR_CLASS)).ok_or(MissingElement::Author)?;
    let body = find_descendant(&post, &class_contains(BODY_CLASS)).ok_or(MissingElement::Body)?;

    Ok(Post {
        author: author.text().trim().to_string(),
        text: body.text().trim().to_string(),
    })
}
