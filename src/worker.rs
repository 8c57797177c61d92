//! Periodic background worker.
//!
//! The worker runs one cycle immediately on [`Worker::start`], then another
//! every `interval` after the previous one finishes. Cycles never overlap:
//! the loop awaits each cycle before it starts the next sleep. If a cycle
//! runs longer than the interval, the next one starts as soon as it ends.
//!
//! [`Worker::stop`] cancels the pending sleep and waits for the task. A
//! cycle that is already running is allowed to finish first.

use crate::cycle::CycleReport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Default gap between cycles: six hours.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// One full pass over every source.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self) -> CycleReport;
}

pub struct Worker<C> {
    runner: Arc<C>,
    interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<C: CycleRunner> Worker<C> {
    pub fn new(runner: Arc<C>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the cycle loop. Calling this on a running worker does nothing.
    #[instrument(level = "info", skip_all, fields(interval_secs = self.interval.as_secs()))]
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("Worker already started");
            return;
        }
        info!("Starting background harvester");

        let runner = Arc::clone(&self.runner);
        let interval = self.interval;
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut cycle: u64 = 0;
            loop {
                cycle += 1;
                let report = runner.run_cycle().await;
                info!(
                    cycle,
                    created = report.created(),
                    existing = report.existing(),
                    failed = report.failed(),
                    "Cycle finished; sleeping"
                );

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!(cycles = cycle, "Background harvester stopped");
        }));
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
    }
}
