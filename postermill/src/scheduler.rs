//! Background task scheduler.
//!
//! Owns the tasks that outlive a request: the per-job pipeline drives (the
//! initial radius followed by the sequential widen pass). Tasks observe the
//! scheduler's shutdown token and each job's own cancellation token; panics
//! and errors are contained in the task, never propagated to callers.

use crate::error::StageError;
use crate::job::JobId;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{run_radius, StageRole};
use crate::providers::{FeatureFetcher, Locator, NetworkFetcher, Renderer, ThemeStore};
use crate::registry::JobRegistry;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawns and tracks background tasks.
pub struct BackgroundScheduler {
    tasks: Mutex<JoinSet<()>>,
    shutdown: CancellationToken,
}

impl BackgroundScheduler {
    /// Creates a scheduler whose tasks stop when `shutdown` fires.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            shutdown,
        }
    }

    /// Spawns a task, reaping any already-finished ones first.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(fut);
    }

    /// Spawns the full pipeline drive for one job: the initial radius,
    /// then the background widen pass.
    pub fn spawn_job_pipeline<L, N, F, R, T>(
        &self,
        ctx: Arc<PipelineContext<L, N, F, R, T>>,
        registry: Arc<JobRegistry>,
        job_id: JobId,
    ) where
        L: Locator,
        N: NetworkFetcher,
        F: FeatureFetcher,
        R: Renderer,
        T: ThemeStore,
    {
        let shutdown = self.shutdown.clone();
        self.spawn(async move {
            drive_job(&ctx, &registry, &job_id, &shutdown).await;
        });
    }

    /// Tasks still tracked (finished-but-unreaped tasks may be included).
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Fires the shutdown token and aborts all tracked tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.lock().abort_all();
        info!("Background scheduler stopped");
    }
}

/// Runs the initial radius and then widens through the remaining available
/// radii, smallest first. Widen failures are confined to their slot; the
/// pass stops early on cancellation, eviction, or scheduler shutdown.
async fn drive_job<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    shutdown: &CancellationToken,
) where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let Some(initial) = registry.with_job(job_id, |job| job.settings.initial_radius) else {
        return;
    };

    if run_radius(ctx, registry, job_id, initial, StageRole::Initial)
        .await
        .is_err()
    {
        // Already recorded in the job; nothing to widen
        return;
    }

    for radius in ctx.config.radii.widen_order(initial) {
        if shutdown.is_cancelled() || !registry.contains(job_id) {
            debug!(job_id = %job_id, "Widen pass stopped early");
            return;
        }
        match run_radius(ctx, registry, job_id, radius, StageRole::Widen).await {
            Ok(()) => {}
            Err(StageError::Cancelled | StageError::JobGone) => return,
            // Confined to the slot; keep widening the rest
            Err(_) => {}
        }
    }
    debug!(job_id = %job_id, "Widen pass finished");
}
