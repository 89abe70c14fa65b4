//! HTTP access to the web archive.
//!
//! # Architecture
//!
//! - [`Fetcher`]: the fetch-by-URL capability every component is written against
//! - [`HttpFetcher`]: `reqwest` implementation with a per-request timeout
//! - [`RetryFetch`]: decorator adding exponential backoff to any [`Fetcher`]
//!
//! # Retry Strategy
//!
//! Only the single index request is wrapped in [`RetryFetch`]. Snapshot
//! fetches go straight to the inner fetcher; a failed snapshot is reported by
//! the ingestion loop and picked up again on the next run.
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
//! ```

use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::config::Config;
use crate::error::{ArchiveError, Result};

/// Fetch the body behind a URL.
///
/// Implementations report transport failures and non-success statuses as
/// [`ArchiveError::Remote`].
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url).await
    }
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ArchiveError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ArchiveError::remote(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::remote(url, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ArchiveError::remote(url, e))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body.to_vec())
    }
}

/// Backoff parameters for [`RetryFetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one before giving up.
    pub max_retries: usize,
    /// Delay before the first retry; doubles with each attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter_ms: 250,
        }
    }

    /// A policy that fails on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter_ms: 0,
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Wrapper that retries a [`Fetcher`] with exponential backoff and jitter.
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Fetcher> RetryFetch<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T: Fetcher> Fetcher for RetryFetch<T> {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_ms = total_t0.elapsed().as_millis() as u64;

                    if attempt > self.policy.max_retries {
                        error!(
                            attempt,
                            max = self.policy.max_retries,
                            elapsed_ms_total = total_ms,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.policy.max_retries,
                        elapsed_ms_total = total_ms,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails a fixed number of times, then succeeds.
    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl Fetcher for Flaky {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(ArchiveError::remote(url, "HTTP 503 Service Unavailable"));
            }
            Ok(b"[]".to_vec())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = Flaky::new(2);
        let retry = RetryFetch::new(&flaky, RetryPolicy { max_retries: 3, ..RetryPolicy::none() });

        let body = retry.fetch("https://archive.test/cdx").await.unwrap();
        assert_eq!(body, b"[]");
        assert_eq!(flaky.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let flaky = Flaky::new(10);
        let retry = RetryFetch::new(&flaky, RetryPolicy { max_retries: 2, ..RetryPolicy::none() });

        let err = retry.fetch("https://archive.test/cdx").await.unwrap_err();
        assert_eq!(err.kind(), "remote");
        assert_eq!(flaky.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_policy_calls_once() {
        let flaky = Flaky::new(1);
        let retry = RetryFetch::new(&flaky, RetryPolicy::none());

        assert!(retry.fetch("https://archive.test/cdx").await.is_err());
        assert_eq!(flaky.calls.get(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter_ms: 0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(9), Duration::from_secs(30));
    }

    #[test]
    fn test_http_fetcher_builds_from_default_config() {
        assert!(HttpFetcher::new(&Config::default()).is_ok());
    }
}
