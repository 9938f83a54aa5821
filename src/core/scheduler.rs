//! Tick source and single-flight guard for the collection loop.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};

/// Allows at most one cycle in flight.
///
/// A one-permit semaphore: holding the permit means a cycle is running, and
/// dropping it (on completion, error or cancellation) frees the slot.
#[derive(Debug, Clone)]
pub struct CycleGuard {
    slot: Arc<Semaphore>,
}

impl Default for CycleGuard {
    fn default() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }
}

impl CycleGuard {
    /// Claims the slot, or `None` if a cycle is already running.
    pub fn try_begin(&self) -> Option<OwnedSemaphorePermit> {
        self.slot.clone().try_acquire_owned().ok()
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

/// Fixed-period ticker. Ticks missed while a slow cycle runs are dropped,
/// never queued, so a stalled backend cannot cause a burst of cycles.
#[derive(Debug)]
pub struct Scheduler {
    interval: Interval,
    guard: CycleGuard,
}

impl Scheduler {
    /// First tick fires one `period` from now; the caller runs the immediate
    /// cycle itself. `guard` may be shared with other schedulers so that
    /// concurrent loops over the same pipeline still run one cycle at a time.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero. Configuration validation rejects that.
    pub fn with_guard(period: Duration, guard: CycleGuard) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, guard }
    }

    #[cfg(test)]
    fn new(period: Duration) -> Self {
        Self::with_guard(period, CycleGuard::default())
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    pub fn try_begin(&self) -> Option<OwnedSemaphorePermit> {
        self.guard.try_begin()
    }

    #[cfg(test)]
    fn period(&self) -> Duration {
        self.interval.period()
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }
}
