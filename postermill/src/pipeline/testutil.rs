//! Mock collaborators and a wired-up harness for pipeline tests.

use crate::config::PipelineConfig;
use crate::error::{FetchError, LocateError, RenderError};
use crate::geo::{Coordinates, FeatureKind, FeatureSet, Polygon, RoadCategory, RoadEdge, RoadNetwork};
use crate::job::slot::Radius;
use crate::job::{JobId, JobSettings};
use crate::pipeline::context::PipelineContext;
use crate::providers::{FeatureFetcher, Locator, NetworkFetcher, Renderer};
use crate::registry::JobRegistry;
use crate::render::{RenderParams, RenderScene};
use crate::theme::{InMemoryThemeStore, Theme};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) fn prague() -> Coordinates {
    Coordinates::new(50.0755, 14.4378)
}

pub(crate) fn sample_network() -> RoadNetwork {
    RoadNetwork::new(vec![
        RoadEdge {
            category: RoadCategory::Motorway,
            points: vec![(14.40, 50.05), (14.45, 50.09)],
        },
        RoadEdge {
            category: RoadCategory::Primary,
            points: vec![(14.42, 50.06), (14.44, 50.08)],
        },
        RoadEdge {
            category: RoadCategory::Residential,
            points: vec![(14.43, 50.07), (14.435, 50.075)],
        },
        RoadEdge {
            category: RoadCategory::Footway,
            points: vec![(14.437, 50.074), (14.438, 50.076)],
        },
    ])
}

/// Geocoder returning Prague for everything, with a failure switch and a
/// configurable delay.
#[derive(Default)]
pub(crate) struct MockLocator {
    fail: AtomicBool,
    delay: Mutex<Duration>,
    calls: AtomicU64,
}

impl MockLocator {
    pub(crate) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Locator for MockLocator {
    fn locate(&self, place: &str) -> impl Future<Output = Result<Coordinates, LocateError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(LocateError::new(place))
        } else {
            Ok(prague())
        };
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }
}

/// Street-network fetcher that counts calls per radius, with a configurable
/// delay and per-radius failure injection.
#[derive(Default)]
pub(crate) struct CountingFetcher {
    delay: Mutex<Duration>,
    failing: Mutex<HashSet<Radius>>,
    calls: Mutex<Vec<Radius>>,
}

impl CountingFetcher {
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub(crate) fn fail_radius(&self, radius: Radius) {
        self.failing.lock().insert(radius);
    }

    pub(crate) fn road_fetches(&self, radius: Radius) -> usize {
        self.calls.lock().iter().filter(|r| **r == radius).count()
    }
}

impl NetworkFetcher for CountingFetcher {
    fn fetch_roads(
        &self,
        _center: Coordinates,
        radius: Radius,
        _categories: &[RoadCategory],
    ) -> impl Future<Output = Result<RoadNetwork, FetchError>> + Send {
        self.calls.lock().push(radius);
        let delay = *self.delay.lock();
        let fail = self.failing.lock().contains(&radius);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                Err(FetchError::new(format!("timeout fetching {radius}")))
            } else {
                Ok(sample_network())
            }
        }
    }
}

/// Feature fetcher returning one polygon per kind.
#[derive(Default)]
pub(crate) struct StubFeatures {
    calls: AtomicU64,
}

impl StubFeatures {
    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeatureFetcher for StubFeatures {
    fn fetch_features(
        &self,
        _center: Coordinates,
        _radius: Radius,
        _kind: FeatureKind,
    ) -> impl Future<Output = Result<FeatureSet, FetchError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            Ok(FeatureSet::new(vec![Polygon {
                exterior: vec![(14.41, 50.06), (14.42, 50.06), (14.42, 50.07), (14.41, 50.06)],
            }]))
        }
    }
}

/// One observed render call.
#[derive(Debug, Clone)]
pub(crate) struct RenderRecord {
    pub file: String,
    pub theme: String,
    pub edges: usize,
    pub water: bool,
    pub parks: bool,
}

/// Renderer that records every call instead of producing an image.
#[derive(Default)]
pub(crate) struct RecordingRenderer {
    records: Mutex<Vec<RenderRecord>>,
    fail_next: AtomicBool,
}

impl RecordingRenderer {
    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn render_count(&self) -> usize {
        self.records.lock().len()
    }

    pub(crate) fn last_record(&self) -> Option<RenderRecord> {
        self.records.lock().last().cloned()
    }
}

impl Renderer for RecordingRenderer {
    fn render(
        &self,
        scene: &RenderScene,
        theme: &Theme,
        _params: &RenderParams,
        output: &Path,
    ) -> impl Future<Output = Result<(), RenderError>> + Send {
        let result = if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(RenderError::new("render backend failure"))
        } else {
            self.records.lock().push(RenderRecord {
                file: output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                theme: theme.name.clone(),
                edges: scene.roads.edge_count(),
                water: scene.water.is_some(),
                parks: scene.parks.is_some(),
            });
            Ok(())
        };
        async move { result }
    }
}

pub(crate) type TestContext =
    PipelineContext<MockLocator, CountingFetcher, StubFeatures, RecordingRenderer, InMemoryThemeStore>;

/// A pipeline context over mocks plus handles to poke them.
pub(crate) struct Harness {
    pub ctx: TestContext,
    pub registry: Arc<JobRegistry>,
    pub locator: Arc<MockLocator>,
    pub network: Arc<CountingFetcher>,
    pub features: Arc<StubFeatures>,
    pub renderer: Arc<RecordingRenderer>,
    pub root: CancellationToken,
}

impl Harness {
    pub(crate) fn create_job(&self, settings: JobSettings) -> JobId {
        self.registry
            .create(settings, &self.ctx.config.radii, self.root.child_token())
    }

    pub(crate) fn locator_fails(&self) {
        self.locator.set_fail(true);
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(PipelineConfig::default().with_progress_tick(Duration::from_millis(10)))
}

pub(crate) fn harness_with(config: PipelineConfig) -> Harness {
    let ctx = PipelineContext::new(
        config,
        MockLocator::default(),
        CountingFetcher::default(),
        StubFeatures::default(),
        RecordingRenderer::default(),
        InMemoryThemeStore::with_builtins(),
    );
    Harness {
        registry: Arc::new(JobRegistry::new()),
        locator: Arc::clone(&ctx.locator),
        network: Arc::clone(&ctx.network),
        features: Arc::clone(&ctx.features),
        renderer: Arc::clone(&ctx.renderer),
        root: CancellationToken::new(),
        ctx,
    }
}
