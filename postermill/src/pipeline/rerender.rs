//! Re-render controller: feature toggles, theme switches, radius switches.
//!
//! All three operations work the same way: verify the target slot is ready,
//! apply the requested change to the record, then re-render from the slot's
//! cached datasets. No operation here ever re-fetches geodata, and a slot
//! that is not ready causes no state change at all.

use crate::error::{RequestError, StageError};
use crate::geo::{Coordinates, FeatureSet, RoadNetwork};
use crate::job::slot::{Radius, SlotState};
use crate::job::{FeatureFlags, FlagDelta, JobId, JobRecord, JobStatus};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::render_artifact;
use crate::providers::{FeatureFetcher, Locator, NetworkFetcher, Renderer, ThemeStore};
use crate::registry::JobRegistry;
use crate::render::RenderParams;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a re-render needs, captured from a ready slot in one atomic
/// registry access.
struct ReadyView {
    radius: Radius,
    roads: Arc<RoadNetwork>,
    water: Arc<FeatureSet>,
    parks: Arc<FeatureSet>,
    params: RenderParams,
    flags: FeatureFlags,
    theme_name: String,
    coords: Coordinates,
}

fn ready_view(job: &JobRecord, radius: Radius) -> Result<ReadyView, RequestError> {
    let data = match job.slot(radius) {
        Some(SlotState::Locked) => return Err(RequestError::Locked(radius)),
        Some(SlotState::Ready(data)) => data,
        _ => return Err(RequestError::NotReady(radius)),
    };
    // A ready slot implies the locate stage ran
    let coords = job.coordinates.ok_or(RequestError::NotReady(radius))?;
    Ok(ReadyView {
        radius,
        roads: Arc::clone(&data.roads),
        water: Arc::clone(&data.water),
        parks: Arc::clone(&data.parks),
        params: data.params,
        flags: job.flags,
        theme_name: job.active_theme.clone(),
        coords,
    })
}

/// Applies a partial feature-flag update and re-renders the active slot.
///
/// Returns the new artifact URL. An empty delta still re-renders; callers
/// wanting to skip that decide before calling.
pub async fn toggle_features<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    delta: FlagDelta,
) -> Result<String, RequestError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let view = registry
        .with_job(job_id, |job| {
            let radius = job.active_radius;
            let mut view = ready_view(job, radius)?;
            // The slot is ready: safe to mutate now
            delta.apply(&mut job.flags);
            view.flags = job.flags;
            Ok::<_, RequestError>(view)
        })
        .ok_or(RequestError::NotFound)??;

    debug!(job_id = %job_id, radius = %view.radius, "Feature toggle re-render");
    rerender_slot(ctx, registry, job_id, view).await
}

/// Switches the active theme and re-renders the active slot.
pub async fn switch_theme<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    theme_name: &str,
) -> Result<String, RequestError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    // Validate the theme before touching the record
    let theme = ctx.themes.load(theme_name)?;

    let view = registry
        .with_job(job_id, |job| {
            let radius = job.active_radius;
            let mut view = ready_view(job, radius)?;
            job.active_theme = theme.name.clone();
            view.theme_name = theme.name.clone();
            Ok::<_, RequestError>(view)
        })
        .ok_or(RequestError::NotFound)??;

    info!(job_id = %job_id, theme = %theme.name, "Theme switched");
    rerender_slot(ctx, registry, job_id, view).await
}

/// Switches the active radius to an already-populated slot and re-renders it
/// with the current flags and theme.
///
/// The switch is served entirely from the slot cache: a slot still loading
/// yields [`RequestError::NotReady`], a locked radius yields
/// [`RequestError::Locked`], and neither mutates the job.
pub async fn switch_radius<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    radius: Radius,
) -> Result<String, RequestError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let view = registry
        .with_job(job_id, |job| ready_view(job, radius))
        .ok_or(RequestError::NotFound)??;

    info!(job_id = %job_id, radius = %radius, "Radius switched");
    rerender_slot(ctx, registry, job_id, view).await
}

/// Renders the slot from its cached datasets and records the new artifact.
async fn rerender_slot<L, N, F, R, T>(
    ctx: &PipelineContext<L, N, F, R, T>,
    registry: &JobRegistry,
    job_id: &JobId,
    view: ReadyView,
) -> Result<String, RequestError>
where
    L: Locator,
    N: NetworkFetcher,
    F: FeatureFetcher,
    R: Renderer,
    T: ThemeStore,
{
    let theme = ctx.themes.load(&view.theme_name)?;

    let url = render_artifact(
        ctx,
        registry,
        job_id,
        view.radius,
        view.coords,
        &view.roads,
        &view.water,
        &view.parks,
        &view.params,
        view.flags,
        &theme,
    )
    .await
    .map_err(|err| match err {
        StageError::Render(render) => RequestError::Render(render),
        // The job disappeared mid-render (sweeper eviction)
        _ => RequestError::NotFound,
    })?;

    registry
        .with_job(job_id, |job| {
            if matches!(job.status, JobStatus::Error | JobStatus::Cancelled) {
                return;
            }
            if let Some(SlotState::Ready(data)) = job.slots.get_mut(&view.radius) {
                data.artifact_url = url.clone();
            }
            if job.status == JobStatus::Complete {
                job.active_radius = view.radius;
                job.artifact_url = Some(url.clone());
            }
        })
        .ok_or(RequestError::NotFound)?;

    Ok(url)
}
