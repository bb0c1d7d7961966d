//! Job registry: the single source of truth for job state.
//!
//! The registry exclusively owns all job records. Every component - the
//! stage executor, background tasks, the re-render controller, the sweeper -
//! receives it by reference and mutates records only through [`with_job`],
//! which runs the mutation as one atomic step under the record lock. Nothing
//! holds a record lock across an await point.
//!
//! [`with_job`]: JobRegistry::with_job

use crate::config::RadiusPolicy;
use crate::job::{JobId, JobRecord, JobSettings, JobSnapshot};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifetime counters, exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub created: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub expired: u64,
}

/// Shared mapping from job identifier to job record.
pub struct JobRegistry {
    jobs: DashMap<JobId, Arc<Mutex<JobRecord>>>,
    created: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    expired: AtomicU64,
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            created: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Creates a job record and returns its identifier.
    ///
    /// The record starts in `Starting` state with one slot per radius,
    /// locked per `policy`. `cancel` becomes the job's cancellation token.
    pub fn create(
        &self,
        settings: JobSettings,
        policy: &RadiusPolicy,
        cancel: CancellationToken,
    ) -> JobId {
        let id = JobId::new();
        let record = JobRecord::new(id.clone(), settings, policy, cancel);
        self.jobs.insert(id.clone(), Arc::new(Mutex::new(record)));
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = %id, "Job registered");
        id
    }

    /// Returns true when the job still exists.
    ///
    /// Background tasks call this before each mutation to tolerate the
    /// sweeper evicting their job mid-flight.
    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    /// Runs `f` on the record under its lock; one atomic mutation.
    ///
    /// Returns `None` when the job does not exist. The closure must not
    /// block; record locks are never held across await points.
    pub fn with_job<R>(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        let entry = self.jobs.get(id).map(|r| Arc::clone(r.value()))?;
        let mut record = entry.lock();
        Some(f(&mut record))
    }

    /// Returns the job's cancellation token.
    pub fn cancel_token(&self, id: &JobId) -> Option<CancellationToken> {
        self.with_job(id, |job| job.cancel_token())
    }

    /// Takes a status snapshot; always well-formed.
    ///
    /// Unknown identifiers yield a `NotFound` snapshot rather than an error,
    /// so polling clients never need to special-case transport failures.
    pub fn snapshot(&self, id: &JobId) -> JobSnapshot {
        self.with_job(id, |job| job.snapshot())
            .unwrap_or_else(|| JobSnapshot::not_found(id.clone()))
    }

    /// Requests cooperative cancellation of a job.
    ///
    /// Marks the record cancelled and fires its token so in-flight stages
    /// stop at their next suspension point. Returns false for unknown jobs
    /// and for jobs already in a terminal state.
    pub fn cancel(&self, id: &JobId) -> bool {
        let transitioned = self
            .with_job(id, |job| job.mark_cancelled())
            .unwrap_or(false);
        if transitioned {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %id, "Job cancelled");
        }
        transitioned
    }

    /// Completes a job with `radius` as the active slot.
    pub(crate) fn complete_job(&self, id: &JobId, radius: crate::job::slot::Radius) -> bool {
        let completed = self
            .with_job(id, |job| job.complete(radius))
            .unwrap_or(false);
        if completed {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
        completed
    }

    /// Fails a job with a human-readable cause.
    pub(crate) fn fail_job(&self, id: &JobId, cause: &str) {
        let failed = self
            .with_job(id, |job| {
                if job.is_terminal() {
                    false
                } else {
                    job.fail(cause);
                    true
                }
            })
            .unwrap_or(false);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Deletes a job record and all its slot data.
    pub fn remove(&self, id: &JobId) -> bool {
        self.jobs.remove(id).is_some()
    }

    /// Deletes an expired job: fires its token first so any in-flight
    /// background work stops, then drops the record.
    pub(crate) fn remove_expired(&self, id: &JobId) -> bool {
        if let Some(token) = self.cancel_token(id) {
            token.cancel();
        }
        let removed = self.remove(id);
        if removed {
            self.expired.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %id, "Job expired and evicted");
        }
        removed
    }

    /// Identifiers of jobs older than `ttl`.
    pub fn expired_ids(&self, ttl: Duration) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|entry| entry.value().lock().created_at.elapsed() > ttl)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of live job records.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshot of the lifetime counters.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            created: self.created.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
