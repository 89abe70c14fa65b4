//! Command-line interface definitions.
//!
//! The handle is the only required input. Everything else has a default and
//! most options can also come from the environment or the YAML config file.

use clap::Parser;

/// Archive every Wayback Machine capture of a Twitter handle's posts.
///
/// # Examples
///
/// ```sh
/// # Writes ./Notch.sqlite and ./Notch.csv
/// wayback_tweets @Notch
///
/// # Keep databases and exports apart
/// wayback_tweets notch --db-dir ./db --output-dir ./csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Twitter handle to archive; a leading "@" is ignored
    pub handle: String,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "WAYBACK_TWEETS_CONFIG")]
    pub config: Option<String>,

    /// Directory the <handle>.csv export is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Directory holding the per-handle <handle>.sqlite database
    #[arg(short, long, env = "WAYBACK_TWEETS_DB_DIR", default_value = ".")]
    pub db_dir: String,

    /// Per-request timeout in seconds (overrides the config file)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Pause between snapshot fetches in milliseconds (overrides the config file)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}
