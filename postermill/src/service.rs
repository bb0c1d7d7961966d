//! Service facade: the surface an HTTP layer (or embedding application)
//! talks to.
//!
//! One [`PosterService`] owns the registry, the background scheduler, and
//! the expiry sweeper. Creating a job spawns its pipeline drive and returns
//! immediately; everything else is either a cheap registry read (status) or
//! a cache-served re-render (toggles, switches).

use crate::config::PipelineConfig;
use crate::error::RequestError;
use crate::job::slot::Radius;
use crate::job::{FlagDelta, JobId, JobSettings, JobSnapshot};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::rerender;
use crate::providers::{FeatureFetcher, Locator, NetworkFetcher, Renderer, ThemeStore};
use crate::registry::{JobRegistry, RegistryStats};
use crate::scheduler::BackgroundScheduler;
use crate::sweeper::ExpirySweeper;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The poster generation service.
///
/// Generic over the collaborator implementations; production wires OSM
/// fetchers and a raster renderer, tests wire mocks.
pub struct PosterService<L, N, F, R, T>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    ctx: Arc<PipelineContext<L, N, F, R, T>>,
    registry: Arc<JobRegistry>,
    scheduler: BackgroundScheduler,
    root: CancellationToken,
}

impl<L, N, F, R, T> PosterService<L, N, F, R, T>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    /// Creates the service and starts the expiry sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: PipelineConfig, locator: L, network: N, features: F, renderer: R, themes: T) -> Self {
        let ctx = Arc::new(PipelineContext::new(
            config, locator, network, features, renderer, themes,
        ));
        let registry = Arc::new(JobRegistry::new());
        let root = CancellationToken::new();
        let scheduler = BackgroundScheduler::new(root.child_token());

        let sweeper = ExpirySweeper::new(Arc::clone(&registry))
            .with_ttl(ctx.config.ttl)
            .with_interval(ctx.config.sweep_interval);
        tokio::spawn(sweeper.run(root.child_token()));

        info!(
            ttl_secs = ctx.config.ttl.as_secs(),
            max_ops = ctx.config.max_concurrent_ops,
            "Poster service started"
        );
        Self {
            ctx,
            registry,
            scheduler,
            root,
        }
    }

    /// Creates a job and spawns its pipeline drive.
    ///
    /// Validates the theme and the initial radius up front so the caller
    /// gets a synchronous rejection instead of a failed job.
    pub fn create_job(&self, settings: JobSettings) -> Result<JobId, RequestError> {
        self.ctx.themes.load(&settings.theme)?;
        if self.ctx.config.radii.is_locked(settings.initial_radius) {
            return Err(RequestError::Locked(settings.initial_radius));
        }

        let id = self
            .registry
            .create(settings, &self.ctx.config.radii, self.root.child_token());
        self.scheduler
            .spawn_job_pipeline(Arc::clone(&self.ctx), Arc::clone(&self.registry), id.clone());
        info!(job_id = %id, "Job created");
        Ok(id)
    }

    /// Takes a status snapshot; never fails.
    pub fn status(&self, id: &JobId) -> JobSnapshot {
        self.registry.snapshot(id)
    }

    /// Requests cancellation; returns false for unknown or terminal jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        self.registry.cancel(id)
    }

    /// Applies a feature-flag delta and re-renders the active slot.
    pub async fn toggle_features(&self, id: &JobId, delta: FlagDelta) -> Result<String, RequestError> {
        rerender::toggle_features(&self.ctx, &self.registry, id, delta).await
    }

    /// Switches the theme and re-renders the active slot.
    pub async fn switch_theme(&self, id: &JobId, theme: &str) -> Result<String, RequestError> {
        rerender::switch_theme(&self.ctx, &self.registry, id, theme).await
    }

    /// Switches the active radius to an already-populated slot.
    pub async fn switch_radius(&self, id: &JobId, radius: Radius) -> Result<String, RequestError> {
        rerender::switch_radius(&self.ctx, &self.registry, id, radius).await
    }

    /// Registry the service operates on (status pages, metrics exporters).
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Pipeline context, exposing the collaborators and configuration.
    pub fn context(&self) -> &PipelineContext<L, N, F, R, T> {
        &self.ctx
    }

    /// Lifetime counters.
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Stops the sweeper and all background pipeline drives.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.scheduler.shutdown();
        info!("Poster service stopped");
    }
}

impl<L, N, F, R, T> Drop for PosterService<L, N, F, R, T>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    fn drop(&mut self) {
        self.root.cancel();
    }
}
