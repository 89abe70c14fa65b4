//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! command-line flags (see [`Config::apply_cli`]).
//!
//! ```yaml
//! archive_base_url: https://web.archive.org
//! site_base_url: https://twitter.com
//! request_timeout_secs: 30
//! request_delay_ms: 500
//! index_retries: 3
//! ```

use serde::Deserialize;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

use crate::cli::Cli;
use crate::error::{ArchiveError, Result};
use crate::models::Handle;

const DEFAULT_USER_AGENT: &str = concat!("wayback_tweets/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the web archive (index and replay endpoints live under it).
    pub archive_base_url: String,
    /// Site whose status pages were captured.
    pub site_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Courtesy pause after each snapshot fetch, before jitter.
    pub request_delay_ms: u64,
    /// Retries for the index request. Snapshot fetches are never retried.
    pub index_retries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_base_url: "https://web.archive.org".to_string(),
            site_base_url: "https://twitter.com".to_string(),
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay_ms: 500,
            index_retries: 3,
        }
    }
}

impl Config {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| ArchiveError::Config(format!("cannot read {path}: {e}")))?;
        let config = Self::from_yaml(&raw)?;
        info!(path, "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty file is a valid "all defaults" config.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| ArchiveError::Config(e.to_string()))
    }

    /// Command-line flags win over file values.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(secs) = cli.timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(ms) = cli.delay_ms {
            self.request_delay_ms = ms;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        Endpoints::new(&self.archive_base_url, &self.site_base_url)
    }
}

/// URL templates for the archive's index and replay endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    archive_base: String,
    site_base: String,
}

impl Endpoints {
    pub fn new(archive_base: &str, site_base: &str) -> Result<Self> {
        Ok(Self {
            archive_base: validated_base(archive_base)?,
            site_base: validated_base(site_base)?,
        })
    }

    /// CDX query for every captured status URL of `handle`, as JSON rows.
    ///
    /// # Arguments
    ///
    /// * `handle` - Validated account name, inserted as `<site>/<handle>/status/*`
    ///
    /// # Returns
    ///
    /// `<archive>/cdx/search/cdx?url=...&output=json`, query-encoded.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Config`] if the archive base cannot form a URL.
    pub fn index_url(&self, handle: &Handle) -> Result<String> {
        let pattern = format!("{}/{}/status/*", self.site_base, handle);
        let url = Url::parse_with_params(
            &format!("{}/cdx/search/cdx", self.archive_base),
            &[("url", pattern.as_str()), ("output", "json")],
        )
        .map_err(|e| ArchiveError::Config(format!("cannot build index URL: {e}")))?;
        Ok(url.to_string())
    }

    /// Replay URL of one capture. The CSV `wmLink` column uses it verbatim.
    pub fn snapshot_url(&self, timestamp: i64, original_url: &str) -> String {
        format!("{}/web/{}/{}", self.archive_base, timestamp, original_url)
    }
}

#[cfg(test)]
impl Default for Endpoints {
    fn default() -> Self {
        let config = Config::default();
        Self {
            archive_base: config.archive_base_url,
            site_base: config.site_base_url,
        }
    }
}

fn validated_base(raw: &str) -> Result<String> {
    let parsed =
        Url::parse(raw).map_err(|e| ArchiveError::Config(format!("invalid base URL {raw:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ArchiveError::Config(format!(
            "base URL {raw:?} must be http or https"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
