//! Shared context for pipeline runs.

use crate::config::PipelineConfig;
use crate::limiter::OpLimiter;
use crate::providers::{FeatureFetcher, Locator, NetworkFetcher, Renderer, ThemeStore};
use std::sync::Arc;

/// Collaborators, configuration, and the operation limiter, bundled for
/// injection into stage runs and background tasks.
///
/// The context is cheap to clone (everything is behind `Arc`) and is shared
/// by all jobs; per-job state lives in the registry, never here.
pub struct PipelineContext<L, N, F, R, T> {
    pub locator: Arc<L>,
    pub network: Arc<N>,
    pub features: Arc<F>,
    pub renderer: Arc<R>,
    pub themes: Arc<T>,
    pub config: PipelineConfig,
    pub limiter: Arc<OpLimiter>,
}

impl<L, N, F, R, T> PipelineContext<L, N, F, R, T>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    /// Creates a context; the limiter bound comes from the config.
    pub fn new(config: PipelineConfig, locator: L, network: N, features: F, renderer: R, themes: T) -> Self {
        let limiter = Arc::new(OpLimiter::new(config.max_concurrent_ops));
        Self {
            locator: Arc::new(locator),
            network: Arc::new(network),
            features: Arc::new(features),
            renderer: Arc::new(renderer),
            themes: Arc::new(themes),
            config,
            limiter,
        }
    }
}

impl<L, N, F, R, T> Clone for PipelineContext<L, N, F, R, T> {
    fn clone(&self) -> Self {
        Self {
            locator: Arc::clone(&self.locator),
            network: Arc::clone(&self.network),
            features: Arc::clone(&self.features),
            renderer: Arc::clone(&self.renderer),
            themes: Arc::clone(&self.themes),
            config: self.config.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}
