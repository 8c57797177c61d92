//! # Spotlight Harvester
//!
//! A background worker that keeps the content store stocked with news
//! articles and events collected from a fixed set of external sources.
//!
//! ## Features
//!
//! - Collects from HTML listing pages (CSS selectors) and RSS feeds
//! - Sources are a YAML table: allow-listed domains, seed URLs, politeness
//!   delays and selectors, with a built-in table of three sources
//! - Fingerprints every item from its link, so re-running a cycle never
//!   creates a duplicate record
//! - Routes each item to the news or event collection, with slugs and
//!   field bounds applied on the way in
//! - Persists records as JSON files, or in memory with `--memory`
//!
//! ## Usage
//!
//! ```sh
//! spotlight_harvester -d ./data
//! spotlight_harvester -c ./sources.yaml --once
//! ```
//!
//! ## Architecture
//!
//! Each cycle is a pipeline:
//! 1. **Collecting**: every source visits its seed URLs, one source at a time
//! 2. **Normalizing**: items become news or event drafts with slugs
//! 3. **Writing**: drafts whose fingerprint is not stored yet are created
//!
//! The worker runs a cycle at startup and then once per interval until
//! Ctrl-C.

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod cycle;
mod error;
mod fetch;
mod fingerprint;
mod models;
mod normalize;
mod scrapers;
mod store;
mod utils;
mod worker;
mod writer;

use cli::Cli;
use config::SourcesFile;
use cycle::Harvester;
use error::HarvestError;
use fetch::HttpFetcher;
use store::{ContentStore, JsonFileStore, MemoryStore};
use utils::ensure_writable_dir;
use worker::Worker;

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
    info!("spotlight_harvester starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    if args.interval_secs == 0 {
        error!("--interval-secs must be greater than zero");
        return Err(HarvestError::Config("interval must be greater than zero".to_string()).into());
    }

    // ---- Source table ----
    let sources = SourcesFile::load(args.config.as_deref()).inspect_err(|e| {
        error!(error = %e, "Invalid source configuration");
    })?;

    // ---- Store ----
    if args.memory {
        info!("Using in-memory store; records are discarded on exit");
        run(&args, &sources, Arc::new(MemoryStore::new())).await?;
    } else {
        if let Err(e) = ensure_writable_dir(&args.data_dir).await {
            error!(
                path = %args.data_dir.display(),
                error = %e,
                "Data directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
        let store = JsonFileStore::open(&args.data_dir).await?;
        run(&args, &sources, Arc::new(store)).await?;
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    Ok(())
}

async fn run<S: ContentStore + 'static>(
    args: &Cli,
    sources: &SourcesFile,
    store: Arc<S>,
) -> Result<(), Box<dyn Error>> {
    let fetcher = HttpFetcher::new(args.request_timeout())?;
    let harvester = Harvester::from_sources(sources, args.user_agent.as_deref(), fetcher, store)
        .inspect_err(|e| error!(error = %e, "Invalid source configuration"))?;

    if args.once {
        let report = harvester.run_cycle().await;
        info!(
            created = report.created(),
            existing = report.existing(),
            failed = report.failed(),
            "Single cycle finished"
        );
        return Ok(());
    }

    let mut worker = Worker::new(Arc::new(harvester), args.interval());
    worker.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; waiting for the worker to stop");
    worker.stop().await;
    Ok(())
}
