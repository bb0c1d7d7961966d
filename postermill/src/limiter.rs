//! Concurrency bound for heavy fetch/render operations.
//!
//! The external fetchers and the renderer are the expensive parts of the
//! pipeline. A single [`OpLimiter`] caps how many of those calls run at once
//! across all jobs, bounding peak memory and outbound request pressure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore-based bound on concurrent heavy operations.
#[derive(Debug)]
pub struct OpLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Permit for one heavy operation; released on drop.
#[derive(Debug)]
pub struct OpPermit<'a> {
    _permit: OwnedSemaphorePermit,
    limiter: &'a OpLimiter,
}

impl Drop for OpPermit<'_> {
    fn drop(&mut self) {
        self.limiter.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl OpLimiter {
    /// Creates a limiter allowing `max_concurrent` simultaneous operations.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Acquires a permit, waiting until one is free.
    pub async fn acquire(&self) -> OpPermit<'_> {
        // The semaphore is never closed while the limiter is alive
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore closed");

        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);

        OpPermit {
            _permit: permit,
            limiter: self,
        }
    }

    /// Attempts to acquire a permit without waiting.
    pub fn try_acquire(&self) -> Option<OpPermit<'_>> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
        Some(OpPermit {
            _permit: permit,
            limiter: self,
        })
    }

    /// Maximum simultaneous operations.
    #[inline]
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Operations currently holding a permit.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest concurrency observed (for tuning).
    #[inline]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }
}
