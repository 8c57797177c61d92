//! One harvesting cycle.
//!
//! [`Harvester::run_cycle`] walks the registered collectors in registry
//! order, one at a time. Each collector's items go through
//! [`normalize`] and then [`Writer::upsert`] one by one. Nothing in a
//! cycle can fail the cycle: page errors stay inside the collector, and
//! write errors are counted against the item's source and skipped.

use crate::config::{DEFAULT_USER_AGENT, SourcesFile};
use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::normalize::normalize;
use crate::scrapers::SourceCollector;
use crate::store::ContentStore;
use crate::worker::CycleRunner;
use crate::writer::Writer;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Outcome counts for one source in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: String,
    pub pages_visited: usize,
    pub pages_failed: usize,
    pub collected: usize,
    /// Extracted candidates dropped for a blank title or link.
    pub dropped: usize,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Outcome of a whole cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub sources: Vec<SourceSummary>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn created(&self) -> usize {
        self.sources.iter().map(|s| s.created).sum()
    }

    pub fn existing(&self) -> usize {
        self.sources.iter().map(|s| s.existing).sum()
    }

    pub fn failed(&self) -> usize {
        self.sources.iter().map(|s| s.failed).sum()
    }

    pub fn collected(&self) -> usize {
        self.sources.iter().map(|s| s.collected).sum()
    }
}

/// The registered collectors plus everything they feed into.
#[derive(Debug)]
pub struct Harvester<S, F> {
    collectors: Vec<SourceCollector>,
    fetcher: F,
    writer: Writer<S>,
}

impl<S: ContentStore, F: PageFetcher> Harvester<S, F> {
    pub fn new(collectors: Vec<SourceCollector>, fetcher: F, store: Arc<S>) -> Self {
        Self {
            collectors,
            fetcher,
            writer: Writer::new(store),
        }
    }

    /// Build one collector per configured source, in file order.
    ///
    /// User agent precedence: per-source setting, then `user_agent`, then the
    /// table's top-level value, then [`DEFAULT_USER_AGENT`].
    pub fn from_sources(
        sources: &SourcesFile,
        user_agent: Option<&str>,
        fetcher: F,
        store: Arc<S>,
    ) -> Result<Self> {
        let default_ua = user_agent
            .or(sources.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT);
        let collectors = sources
            .sources
            .iter()
            .map(|cfg| SourceCollector::from_config(cfg, default_ua))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(collectors, fetcher, store))
    }

    pub fn store(&self) -> &S {
        self.writer.store()
    }

    /// Run every collector once and persist what they found.
    ///
    /// Sources run in registry order, one at a time, and each item is
    /// normalized and written before the next is looked at. A failing page,
    /// source, or write only shows up in that source's counters.
    ///
    /// # Returns
    ///
    /// A [`CycleReport`] with one [`SourceSummary`] per source, in registry
    /// order, and the wall-clock time the cycle took.
    #[instrument(level = "info", skip_all, fields(sources = self.collectors.len()))]
    pub async fn run_cycle(&self) -> CycleReport {
        info!("Starting harvest cycle");
        let t0 = Instant::now();
        let mut report = CycleReport::default();

        for collector in &self.collectors {
            let collection = collector.collect(&self.fetcher).await;
            let mut summary = SourceSummary {
                source: collector.name().to_string(),
                pages_visited: collection.pages_visited,
                pages_failed: collection.pages_failed,
                collected: collection.items.len(),
                dropped: collection.dropped,
                ..Default::default()
            };

            for item in collection.items {
                match self.writer.upsert(normalize(item)).await {
                    Ok(true) => summary.created += 1,
                    Ok(false) => summary.existing += 1,
                    Err(_) => summary.failed += 1,
                }
            }

            if summary.pages_visited > 0 && summary.pages_failed == summary.pages_visited {
                warn!(source = %summary.source, "Every page of the source failed this cycle");
            }
            info!(
                source = %summary.source,
                collected = summary.collected,
                dropped = summary.dropped,
                created = summary.created,
                existing = summary.existing,
                failed = summary.failed,
                pages_failed = summary.pages_failed,
                "Source complete"
            );
            report.sources.push(summary);
        }

        report.elapsed = t0.elapsed();
        info!(
            collected = report.collected(),
            created = report.created(),
            existing = report.existing(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Harvest cycle complete"
        );
        match self.store().totals().await {
            Ok(t) => info!(news = t.news, events = t.events, "Stored record totals"),
            Err(e) => warn!(error = %e, "Could not read store totals"),
        }
        report
    }
}

#[async_trait]
impl<S, F> CycleRunner for Harvester<S, F>
where
    S: ContentStore + 'static,
    F: PageFetcher + 'static,
{
    async fn run_cycle(&self) -> CycleReport {
        Harvester::run_cycle(self).await
    }
}
