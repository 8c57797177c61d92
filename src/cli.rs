//! Command-line interface for the harvester.
//!
//! Every option can also be set through its `HARVEST_*` environment variable.

use crate::worker::DEFAULT_INTERVAL;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Background harvester that collects news and events from configured
/// sources into the content store.
///
/// # Examples
///
/// ```sh
/// # Run forever with the built-in sources, one cycle every six hours
/// spotlight_harvester -d ./data
///
/// # One cycle against a custom source table, then exit
/// spotlight_harvester -c ./sources.yaml --once
///
/// # Try a source table without touching the data directory
/// spotlight_harvester -c ./sources.yaml --once --memory
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a sources.yaml file; the built-in table is used otherwise
    #[arg(short, long, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding news.json and events.json
    #[arg(short, long, env = "HARVEST_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Seconds to sleep between the end of one cycle and the start of the next
    #[arg(long, env = "HARVEST_INTERVAL_SECS", default_value_t = DEFAULT_INTERVAL.as_secs())]
    pub interval_secs: u64,

    /// User-Agent sent to sources that do not set their own
    #[arg(long, env = "HARVEST_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "HARVEST_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Keep records in memory only; nothing is written to the data directory
    #[arg(long)]
    pub memory: bool,
}

impl Cli {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
