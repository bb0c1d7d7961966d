//! Stage executor: drives one radius slot through the full pipeline.
//!
//! One run covers locate -> street fetch -> feature fetches -> render for a
//! single radius. The run claims its slot exactly once before doing any
//! work, checks the job's cancellation token before every step, and writes
//! its outcome back through the registry. Failures never escape to the
//! scheduler; they land in the slot (and the job, for the initial radius).

use crate::error::{RenderError, StageError};
use crate::geo::{filter_roads, Coordinates, FeatureKind, FeatureSet, RoadCategory, RoadNetwork};
use crate::job::slot::{Radius, SlotData, SlotState};
use crate::job::{FeatureFlags, JobId, JobSettings};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::progress::{
    ProgressReporter, MSG_LOCATE, MSG_PARKS, MSG_RENDER, MSG_ROADS, MSG_SAVE, MSG_WATER,
    PCT_LOCATE, SPAN_FEATURES, SPAN_LOCATE, SPAN_RENDER, SPAN_ROADS, STEP_LOCATE, STEP_PARKS,
    STEP_RENDER, STEP_ROADS, STEP_SAVE, STEP_WATER,
};
use crate::providers::{FeatureFetcher, Locator, NetworkFetcher, Renderer, ThemeStore};
use crate::registry::JobRegistry;
use crate::render::{artifact_file_name, place_slug, RenderParams, RenderScene};
use crate::theme::Theme;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether a run produces the user-visible result or fills the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// First radius of the job: reports progress and completes the job.
    Initial,
    /// Background widen: silent, and failures stay confined to the slot.
    Widen,
}

/// Runs the full pipeline for one radius slot.
///
/// Returns `Ok(())` both on success and when the slot was not claimable
/// (already loading, ready, or locked) - the latter is a benign race, not a
/// failure. Errors are already recorded in the registry when this returns.
pub async fn run_radius<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    radius: Radius,
    role: StageRole,
) -> Result<(), StageError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let cancel = registry.cancel_token(job_id).ok_or(StageError::JobGone)?;
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }

    let claimed = registry
        .with_job(job_id, |job| job.claim_slot(radius))
        .ok_or(StageError::JobGone)?;
    if !claimed {
        debug!(job_id = %job_id, radius = %radius, "Slot not claimable, skipping");
        return Ok(());
    }

    match run_claimed(ctx, registry, job_id, radius, role, &cancel).await {
        Ok(()) => Ok(()),
        Err(StageError::Cancelled) => {
            // Slot stays Loading; the record is frozen and the sweeper will
            // evict it.
            debug!(job_id = %job_id, radius = %radius, "Stage run cancelled");
            Err(StageError::Cancelled)
        }
        Err(StageError::JobGone) => Err(StageError::JobGone),
        Err(err) => {
            registry.with_job(job_id, |job| {
                job.set_slot(
                    radius,
                    SlotState::Error {
                        cause: err.to_string(),
                    },
                );
            });
            match role {
                StageRole::Initial => {
                    registry.fail_job(job_id, &err.to_string());
                    warn!(job_id = %job_id, radius = %radius, error = %err, "Initial radius failed");
                }
                StageRole::Widen => {
                    warn!(job_id = %job_id, radius = %radius, error = %err, "Widen radius failed");
                }
            }
            Err(err)
        }
    }
}

async fn run_claimed<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    radius: Radius,
    role: StageRole,
    cancel: &CancellationToken,
) -> Result<(), StageError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let reporter = ProgressReporter::new(
        registry,
        job_id,
        role == StageRole::Initial,
        ctx.config.progress_tick,
    );

    let (settings, known_coords): (JobSettings, Option<Coordinates>) = registry
        .with_job(job_id, |job| {
            job.begin_running();
            (job.settings.clone(), job.coordinates)
        })
        .ok_or(StageError::JobGone)?;

    // Locate once per job; later radii reuse the resolved coordinates.
    reporter.step(STEP_LOCATE, PCT_LOCATE, MSG_LOCATE);
    let coords = match known_coords {
        Some(coords) => coords,
        None => {
            let coords = reporter
                .drive(SPAN_LOCATE, cancel, ctx.locator.locate(&settings.place))
                .await??;
            registry
                .with_job(job_id, |job| job.coordinates = Some(coords))
                .ok_or(StageError::JobGone)?;
            debug!(job_id = %job_id, %coords, "Place resolved");
            coords
        }
    };
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }

    // Primary dataset: the street network.
    reporter.step(STEP_ROADS, SPAN_ROADS.start, MSG_ROADS);
    let roads = reporter
        .drive(SPAN_ROADS, cancel, async {
            let _permit = ctx.limiter.acquire().await;
            ctx.network
                .fetch_roads(coords, radius, &RoadCategory::ALL)
                .await
        })
        .await??;
    let roads = Arc::new(roads);

    // Secondary datasets fetch concurrently with each other.
    reporter.step(STEP_WATER, SPAN_FEATURES.start, MSG_WATER);
    let (water, parks) = reporter
        .drive(SPAN_FEATURES, cancel, async {
            let water = async {
                let _permit = ctx.limiter.acquire().await;
                ctx.features
                    .fetch_features(coords, radius, FeatureKind::Water)
                    .await
            };
            let parks = async {
                let _permit = ctx.limiter.acquire().await;
                ctx.features
                    .fetch_features(coords, radius, FeatureKind::Parks)
                    .await
            };
            tokio::join!(water, parks)
        })
        .await?;
    let water = Arc::new(water?);
    let parks = Arc::new(parks?);
    reporter.step(STEP_PARKS, SPAN_FEATURES.end, MSG_PARKS);
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }

    // Viewport values are derived once here and cached with the slot.
    let params = RenderParams::derive(radius, settings.width_in, settings.height_in);

    let (flags, theme_name) = registry
        .with_job(job_id, |job| (job.flags, job.active_theme.clone()))
        .ok_or(StageError::JobGone)?;
    let theme = ctx
        .themes
        .load(&theme_name)
        .map_err(|e| RenderError::new(e.to_string()))?;

    reporter.step(STEP_RENDER, SPAN_RENDER.start, MSG_RENDER);
    let artifact_url = reporter
        .drive(
            SPAN_RENDER,
            cancel,
            render_artifact(
                ctx, registry, job_id, radius, coords, &roads, &water, &parks, &params, flags,
                &theme,
            ),
        )
        .await??;

    reporter.step(STEP_SAVE, SPAN_RENDER.end, MSG_SAVE);
    registry
        .with_job(job_id, |job| {
            job.set_slot(
                radius,
                SlotState::Ready(SlotData {
                    roads,
                    water,
                    parks,
                    params,
                    artifact_url: artifact_url.clone(),
                }),
            );
        })
        .ok_or(StageError::JobGone)?;

    match role {
        StageRole::Initial => {
            registry.complete_job(job_id, radius);
            info!(job_id = %job_id, radius = %radius, url = %artifact_url, "Job complete");
        }
        StageRole::Widen => {
            debug!(job_id = %job_id, radius = %radius, url = %artifact_url, "Widen radius ready");
        }
    }
    Ok(())
}

/// Renders one artifact from already-fetched datasets and returns its URL.
///
/// Shared by the stage executor and the re-render controller: assembles the
/// scene from the feature flags, names the artifact with a fresh render
/// sequence number, and runs the renderer under a limiter permit.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn render_artifact<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    radius: Radius,
    coords: Coordinates,
    roads: &Arc<RoadNetwork>,
    water: &Arc<FeatureSet>,
    parks: &Arc<FeatureSet>,
    params: &RenderParams,
    flags: FeatureFlags,
    theme: &Theme,
) -> Result<String, StageError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let (seq, place) = registry
        .with_job(job_id, |job| {
            (job.next_render_seq(), job.settings.place.clone())
        })
        .ok_or(StageError::JobGone)?;

    let file_name = artifact_file_name(&place_slug(&place), &theme.name, radius, job_id, seq);
    let output = ctx.config.output_dir.join(&file_name);

    let scene = RenderScene {
        place_label: place,
        coordinates: coords,
        roads: filter_roads(roads, &flags.enabled_road_categories()),
        water: flags.water.then(|| Arc::clone(water)),
        parks: flags.parks.then(|| Arc::clone(parks)),
    };

    let _permit = ctx.limiter.acquire().await;
    ctx.renderer.render(&scene, theme, params, &output).await?;

    Ok(format!("{}/{}", ctx.config.url_prefix, file_name))
}
