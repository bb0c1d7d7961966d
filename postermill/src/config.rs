//! Pipeline configuration.
//!
//! One [`PipelineConfig`] is shared by the service, stage executor,
//! scheduler, and sweeper. Defaults match the production deployment; tests
//! shrink the timing knobs.

use crate::job::slot::Radius;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Default job time-to-live: 30 minutes.
pub const DEFAULT_TTL_SECS: u64 = 1_800;

/// Default interval between sweeper scans: 60 seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default interval between progress ticks while a fetch is outstanding.
pub const DEFAULT_PROGRESS_TICK_MS: u64 = 250;

/// Default bound on concurrent heavy fetch/render operations.
pub const DEFAULT_MAX_CONCURRENT_OPS: usize = 2;

/// Which radii are available versus locked.
///
/// Locked radii require an entitlement unlock that is out of scope here;
/// their slots are created in `Locked` state and never claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusPolicy {
    available: BTreeSet<Radius>,
}

impl Default for RadiusPolicy {
    /// 3/5/10km available; 15/20km locked.
    fn default() -> Self {
        Self::new([Radius::Km3, Radius::Km5, Radius::Km10])
    }
}

impl RadiusPolicy {
    /// Creates a policy with the given available radii.
    pub fn new(available: impl IntoIterator<Item = Radius>) -> Self {
        Self {
            available: available.into_iter().collect(),
        }
    }

    /// Policy with every radius available (no entitlement gating).
    pub fn all_available() -> Self {
        Self::new(Radius::ALL)
    }

    #[inline]
    pub fn is_locked(&self, radius: Radius) -> bool {
        !self.available.contains(&radius)
    }

    /// Available radii, smallest first.
    pub fn available(&self) -> impl Iterator<Item = Radius> + '_ {
        self.available.iter().copied()
    }

    /// Radii the background widen pass should run after `initial`,
    /// smallest first, excluding locked radii and the initial radius.
    pub fn widen_order(&self, initial: Radius) -> Vec<Radius> {
        self.available().filter(|r| *r != initial).collect()
    }
}

/// Tuning knobs for the whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Job records older than this are evicted by the sweeper.
    pub ttl: Duration,
    /// Interval between sweeper scans.
    pub sweep_interval: Duration,
    /// Interval between progress ticks while awaiting a collaborator.
    pub progress_tick: Duration,
    /// Maximum simultaneous heavy fetch/render operations, process-wide.
    pub max_concurrent_ops: usize,
    /// Directory the renderer writes artifacts into.
    pub output_dir: PathBuf,
    /// URL prefix under which artifacts are served.
    pub url_prefix: String,
    /// Available/locked radius split.
    pub radii: RadiusPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            progress_tick: Duration::from_millis(DEFAULT_PROGRESS_TICK_MS),
            max_concurrent_ops: DEFAULT_MAX_CONCURRENT_OPS,
            output_dir: PathBuf::from("posters"),
            url_prefix: "/posters".to_string(),
            radii: RadiusPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_progress_tick(mut self, tick: Duration) -> Self {
        self.progress_tick = tick;
        self
    }

    pub fn with_max_concurrent_ops(mut self, max: usize) -> Self {
        self.max_concurrent_ops = max;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_radius_policy(mut self, radii: RadiusPolicy) -> Self {
        self.radii = radii;
        self
    }
}
