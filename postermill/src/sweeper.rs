//! Expiry sweeper: evicts job records past their time-to-live.
//!
//! Jobs are transient. The sweeper periodically scans the registry, fires
//! the cancellation token of every expired job so in-flight work stops, and
//! deletes the records. Clients polling an evicted job see a well-formed
//! "not found" snapshot.

use crate::config::{DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TTL_SECS};
use crate::registry::JobRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic eviction of expired jobs.
pub struct ExpirySweeper {
    registry: Arc<JobRegistry>,
    ttl: Duration,
    interval: Duration,
}

impl ExpirySweeper {
    /// Creates a sweeper with the default TTL and interval.
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self {
            registry,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    /// Sets the job time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the interval between sweeps.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs one sweep; returns the number of jobs evicted.
    ///
    /// Eviction applies to every job past the TTL regardless of state:
    /// running jobs get their token fired first so their stages stop.
    pub fn sweep_once(&self) -> usize {
        let expired = self.registry.expired_ids(self.ttl);
        for id in &expired {
            self.registry.remove_expired(id);
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), "Expired jobs evicted");
        }
        expired.len()
    }

    /// Runs the sweep loop until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper started"
        );
        let mut interval = tokio::time::interval(self.interval);
        // First tick fires immediately; skip it so the first sweep happens
        // one full interval after startup.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Expiry sweeper stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.sweep_once();
                }
            }
        }
    }
}
