//! Collection/shipping loop.
//!
//! The [`Orchestrator`] runs one cycle immediately, then one per interval
//! tick, strictly sequentially. A cycle collects from every registered source
//! and, if anything was collected, hands the batch to the shipper. Failures
//! are logged; the next tick is the retry.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    collectors::Registry,
    scheduler::{CycleGuard, Scheduler},
    shipper::Shipper,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The driving cancellation token fired.
    #[error("Orchestrator cancelled")]
    Cancelled,
}

/// Snapshot of the loop counters. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles that ran to the end, whatever their outcome.
    pub completed: u64,
    /// Cycles whose batch was accepted by the backend.
    pub shipped: u64,
    pub failed_shipments: u64,
    /// Ticks dropped because a cycle was still running.
    pub skipped_ticks: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    shipped: AtomicU64,
    failed_shipments: AtomicU64,
    skipped_ticks: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CycleStats {
        CycleStats {
            completed: self.completed.load(Ordering::Relaxed),
            shipped: self.shipped.load(Ordering::Relaxed),
            failed_shipments: self.failed_shipments.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
        }
    }
}

pub struct Orchestrator {
    registry: Registry,
    shipper: Arc<dyn Shipper>,
    interval: Duration,
    stop: CancellationToken,
    guard: CycleGuard,
    counters: Counters,
}

impl Orchestrator {
    pub fn new(registry: Registry, shipper: Arc<dyn Shipper>, interval: Duration) -> Self {
        Self {
            registry,
            shipper,
            interval,
            stop: CancellationToken::new(),
            guard: CycleGuard::default(),
            counters: Counters::default(),
        }
    }

    /// Runs until `ctx` is cancelled or [`Orchestrator::stop`] is called.
    ///
    /// Cancellation aborts an in-flight cycle and returns
    /// `Err(OrchestratorError::Cancelled)`. A stop request lets the running
    /// cycle finish and returns `Ok(())` at the next decision point.
    pub async fn start(&self, ctx: &CancellationToken) -> Result<(), OrchestratorError> {
        let mut scheduler = Scheduler::with_guard(self.interval, self.guard.clone());

        info!(
            interval_secs = self.interval.as_secs_f64(),
            sources = ?self.registry.names(),
            shipper = self.shipper.name(),
            endpoint = self.shipper.endpoint(),
            "Orchestrator started"
        );

        self.guarded_cycle(&scheduler, ctx).await?;

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("Orchestrator stopping due to cancellation");
                    return Err(OrchestratorError::Cancelled);
                }
                _ = self.stop.cancelled() => {
                    info!("Orchestrator stopped");
                    return Ok(());
                }
                _ = scheduler.tick() => {}
            }

            self.guarded_cycle(&scheduler, ctx).await?;
        }
    }

    /// Requests a graceful stop. Safe to call any number of times, before or
    /// during `start`.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            debug!("Orchestrator stop requested");
        }
        self.stop.cancel();
    }

    pub fn stats(&self) -> CycleStats {
        self.counters.snapshot()
    }

    async fn guarded_cycle(
        &self,
        scheduler: &Scheduler,
        ctx: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let Some(_permit) = scheduler.try_begin() else {
            self.counters.skipped_ticks.fetch_add(1, Ordering::Relaxed);
            warn!("Previous cycle still running, skipping tick");
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                warn!("Cycle aborted by cancellation");
                Err(OrchestratorError::Cancelled)
            }
            _ = self.run_cycle(ctx) => Ok(()),
        }
    }

    async fn run_cycle(&self, ctx: &CancellationToken) {
        let started = Instant::now();
        debug!("Starting metrics collection");

        let batch = self.registry.collect_all(ctx).await;
        let metric_count = batch.len();
        debug!(
            metric_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "Metrics collected"
        );

        if batch.is_empty() {
            debug!("Nothing collected, skipping shipment");
        } else {
            match self.shipper.ship(ctx, &batch).await {
                Ok(()) => {
                    self.counters.shipped.fetch_add(1, Ordering::Relaxed);
                    info!(
                        metric_count,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Collection and shipping cycle completed"
                    );
                }
                Err(e) => {
                    self.counters.failed_shipments.fetch_add(1, Ordering::Relaxed);
                    error!(
                        error = %e,
                        metric_count,
                        endpoint = self.shipper.endpoint(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Failed to ship metrics"
                    );
                }
            }
        }

        self.counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}
