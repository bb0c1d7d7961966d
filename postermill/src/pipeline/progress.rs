//! Progress reporting for stage runs.
//!
//! Step numbers, percent anchors, and messages are fixed so polling clients
//! see the same sequence for every job. While a slow collaborator call is
//! outstanding, [`ProgressReporter::drive`] nudges the percent forward a
//! little on every tick so the bar keeps moving; the record itself enforces
//! that percent never decreases and never reaches 100 before completion.

use crate::error::StageError;
use crate::job::JobId;
use crate::registry::JobRegistry;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const STEP_LOCATE: u8 = 1;
pub const STEP_ROADS: u8 = 2;
pub const STEP_WATER: u8 = 3;
pub const STEP_PARKS: u8 = 4;
pub const STEP_RENDER: u8 = 5;
pub const STEP_SAVE: u8 = 6;

pub const MSG_LOCATE: &str = "Finding location";
pub const MSG_ROADS: &str = "Downloading streets";
pub const MSG_WATER: &str = "Downloading water";
pub const MSG_PARKS: &str = "Downloading parks";
pub const MSG_RENDER: &str = "Rendering map";
pub const MSG_SAVE: &str = "Saving image";

/// Percent range a driven await may fill.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSpan {
    pub start: u8,
    pub end: u8,
}

pub const PCT_LOCATE: u8 = 5;
pub const SPAN_LOCATE: ProgressSpan = ProgressSpan { start: 5, end: 12 };
pub const SPAN_ROADS: ProgressSpan = ProgressSpan { start: 15, end: 40 };
pub const SPAN_FEATURES: ProgressSpan = ProgressSpan { start: 45, end: 70 };
pub const SPAN_RENDER: ProgressSpan = ProgressSpan { start: 75, end: 95 };

/// How much one tick advances the percent within a span.
const TICK_STEP: u8 = 3;

/// Writes progress updates for one stage run.
///
/// Only the run producing the user-visible result reports progress; the
/// background widen pass stays silent so a completed job's bar does not
/// jump backwards.
pub(crate) struct ProgressReporter<'a> {
    registry: &'a JobRegistry,
    job_id: &'a JobId,
    enabled: bool,
    tick: Duration,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(registry: &'a JobRegistry, job_id: &'a JobId, enabled: bool, tick: Duration) -> Self {
        Self {
            registry,
            job_id,
            enabled,
            tick,
        }
    }

    /// Records entry into a step.
    pub(crate) fn step(&self, step: u8, percent: u8, message: &str) {
        if !self.enabled {
            return;
        }
        self.registry.with_job(self.job_id, |job| {
            job.set_progress(step, percent, message);
        });
    }

    /// Awaits `fut` while ticking percent through `span`, stopping early
    /// when `cancel` fires.
    ///
    /// Returns `Err(StageError::Cancelled)` on cancellation; the underlying
    /// collaborator future is dropped at that point, which is the pipeline's
    /// cooperative-cancellation contract.
    pub(crate) async fn drive<F>(
        &self,
        span: ProgressSpan,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<F::Output, StageError>
    where
        F: Future,
    {
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        tokio::pin!(fut);
        let mut interval = tokio::time::interval(self.tick);
        // First tick fires immediately; consume it so ticking starts after
        // one full interval.
        interval.tick().await;

        let mut percent = span.start;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Err(StageError::Cancelled);
                }
                output = &mut fut => {
                    if self.enabled {
                        self.registry.with_job(self.job_id, |job| job.bump_percent(span.end));
                    }
                    return Ok(output);
                }
                _ = interval.tick() => {
                    if self.enabled && percent < span.end {
                        percent = (percent + TICK_STEP).min(span.end);
                        self.registry.with_job(self.job_id, |job| job.bump_percent(percent));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RadiusPolicy;
    use crate::job::JobSettings;
    use std::time::Duration;

    fn setup() -> (JobRegistry, JobId) {
        let registry = JobRegistry::new();
        let id = registry.create(
            JobSettings::new("Prague", "noir"),
            &RadiusPolicy::default(),
            CancellationToken::new(),
        );
        registry.with_job(&id, |job| job.begin_running());
        (registry, id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_returns_future_output() {
        let (registry, id) = setup();
        let reporter = ProgressReporter::new(&registry, &id, true, Duration::from_millis(10));
        let cancel = CancellationToken::new();

        let out = reporter
            .drive(SPAN_ROADS, &cancel, async { 7u32 })
            .await
            .unwrap();

        assert_eq!(out, 7);
        assert_eq!(registry.snapshot(&id).percent, SPAN_ROADS.end);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_ticks_while_awaiting() {
        let (registry, id) = setup();
        let reporter = ProgressReporter::new(&registry, &id, true, Duration::from_millis(10));
        let cancel = CancellationToken::new();
        reporter.step(STEP_ROADS, SPAN_ROADS.start, MSG_ROADS);

        let _ = reporter
            .drive(SPAN_ROADS, &cancel, tokio::time::sleep(Duration::from_millis(35)))
            .await
            .unwrap();

        let snap = registry.snapshot(&id);
        assert_eq!(snap.message, MSG_ROADS);
        assert_eq!(snap.percent, SPAN_ROADS.end);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_on_cancellation() {
        let (registry, id) = setup();
        let reporter = ProgressReporter::new(&registry, &id, true, Duration::from_millis(10));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            canceller.cancel();
        });

        let result = reporter
            .drive(SPAN_ROADS, &cancel, tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(result.unwrap_err(), StageError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_pre_cancelled() {
        let (registry, id) = setup();
        let reporter = ProgressReporter::new(&registry, &id, true, Duration::from_millis(10));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = reporter.drive(SPAN_ROADS, &cancel, async { 1 }).await;
        assert_eq!(result.unwrap_err(), StageError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_reporter_writes_nothing() {
        let (registry, id) = setup();
        let reporter = ProgressReporter::new(&registry, &id, false, Duration::from_millis(10));
        let cancel = CancellationToken::new();

        reporter.step(STEP_ROADS, SPAN_ROADS.start, MSG_ROADS);
        let _ = reporter
            .drive(SPAN_ROADS, &cancel, tokio::time::sleep(Duration::from_millis(35)))
            .await
            .unwrap();

        let snap = registry.snapshot(&id);
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.message, "Starting");
    }
}
