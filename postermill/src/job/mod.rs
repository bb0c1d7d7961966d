//! Job model: identifiers, settings, feature flags, and the job record.
//!
//! A job is one user request to progressively produce a rendered poster. The
//! record tracks overall status, fine-grained progress, and one radius slot
//! per enumerated radius. Records live in the [`crate::registry::JobRegistry`]
//! and are mutated only through it.

pub mod slot;

use crate::config::RadiusPolicy;
use crate::geo::{Coordinates, RoadCategory};
use serde::{Deserialize, Serialize};
use slot::{Radius, SlotState, SlotStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Number of user-visible pipeline steps, matching the progress messages.
pub const TOTAL_STEPS: u8 = 6;

/// Opaque job token handed to clients at creation.
///
/// Eight hex characters of a v4 UUID: unique per process lifetime for any
/// realistic job volume, and short enough to paste into a poll URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Generates a new unique job token.
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..8].to_string())
    }

    /// Wraps an existing token (parsing a client-supplied identifier).
    pub fn from_raw(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall job status.
///
/// `Starting -> Running -> {Complete, Error, Cancelled}`. Terminal states
/// freeze the record: no field mutation after them except sweeper deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Set at creation, before any asynchronous work begins.
    Starting,
    /// The locate stage has begun; progress fields update within this state.
    Running,
    /// At least one radius slot is ready.
    Complete,
    /// A stage failed on the initial radius.
    Error,
    /// Explicitly cancelled by the client.
    Cancelled,
}

impl JobStatus {
    /// Returns true once no further transitions are possible.
    ///
    /// `Complete` still allows slot-level mutation (background widen keeps
    /// filling slots after the user-visible result is ready); `Error` and
    /// `Cancelled` freeze slots too.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Error | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimum poster edge in inches.
pub const MIN_DIMENSION_IN: f64 = 3.0;
/// Maximum poster edge in inches.
pub const MAX_DIMENSION_IN: f64 = 24.0;

/// Immutable settings snapshot taken at job creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Place name as submitted ("Prague" or "Prague, Czech Republic").
    pub place: String,
    /// Theme identifier requested at creation.
    pub theme: String,
    /// Poster width in inches.
    pub width_in: f64,
    /// Poster height in inches.
    pub height_in: f64,
    /// Radius rendered first; the user-visible result.
    pub initial_radius: Radius,
}

impl JobSettings {
    /// Creates settings with the default 12x16in poster at 3km.
    pub fn new(place: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            place: place.into(),
            theme: theme.into(),
            width_in: 12.0,
            height_in: 16.0,
            initial_radius: Radius::Km3,
        }
    }

    /// Sets poster dimensions, clamped to the supported 3-24in range.
    pub fn with_dimensions(mut self, width_in: f64, height_in: f64) -> Self {
        self.width_in = width_in.clamp(MIN_DIMENSION_IN, MAX_DIMENSION_IN);
        self.height_in = height_in.clamp(MIN_DIMENSION_IN, MAX_DIMENSION_IN);
        self
    }

    pub fn with_initial_radius(mut self, radius: Radius) -> Self {
        self.initial_radius = radius;
        self
    }
}

/// Which data categories are visible in a render.
///
/// All flags default to on. Toggling flags after the initial render triggers
/// a re-render from cached data; it never invalidates the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub water: bool,
    pub parks: bool,
    pub motorway: bool,
    pub primary: bool,
    pub secondary: bool,
    pub tertiary: bool,
    pub residential: bool,
    pub footway: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            water: true,
            parks: true,
            motorway: true,
            primary: true,
            secondary: true,
            tertiary: true,
            residential: true,
            footway: true,
        }
    }
}

impl FeatureFlags {
    /// Returns the road categories currently enabled.
    ///
    /// An empty result means "no category selected"; the renderer falls back
    /// to the unfiltered dataset in that case (see [`crate::geo::filter_roads`]).
    pub fn enabled_road_categories(&self) -> BTreeSet<RoadCategory> {
        let pairs = [
            (self.motorway, RoadCategory::Motorway),
            (self.primary, RoadCategory::Primary),
            (self.secondary, RoadCategory::Secondary),
            (self.tertiary, RoadCategory::Tertiary),
            (self.residential, RoadCategory::Residential),
            (self.footway, RoadCategory::Footway),
        ];
        pairs
            .into_iter()
            .filter_map(|(on, cat)| on.then_some(cat))
            .collect()
    }
}

/// Partial update to the feature-flag set.
///
/// Each field is independently settable; `None` keeps the previous value.
/// Deserializes from partial JSON (`{"water": false}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagDelta {
    pub water: Option<bool>,
    pub parks: Option<bool>,
    pub motorway: Option<bool>,
    pub primary: Option<bool>,
    pub secondary: Option<bool>,
    pub tertiary: Option<bool>,
    pub residential: Option<bool>,
    pub footway: Option<bool>,
}

impl FlagDelta {
    /// Merges this delta into `flags`, field by field.
    pub fn apply(&self, flags: &mut FeatureFlags) {
        let pairs = [
            (self.water, &mut flags.water),
            (self.parks, &mut flags.parks),
            (self.motorway, &mut flags.motorway),
            (self.primary, &mut flags.primary),
            (self.secondary, &mut flags.secondary),
            (self.tertiary, &mut flags.tertiary),
            (self.residential, &mut flags.residential),
            (self.footway, &mut flags.footway),
        ];
        for (delta, flag) in pairs {
            if let Some(value) = delta {
                *flag = value;
            }
        }
    }

    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The mutable record for one job.
///
/// Owned exclusively by the registry; every mutation happens under the
/// record lock through [`crate::registry::JobRegistry::with_job`]. Mutators
/// on this type enforce the terminal-state freeze and monotone progress.
#[derive(Debug)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    /// Current user-visible step (1-based; 0 before the first stage).
    pub step: u8,
    /// Progress percentage, 0-100, non-decreasing within a run.
    pub percent: u8,
    /// Human-readable progress message.
    pub message: String,
    /// Cause of failure; present only when status is `Error`.
    pub error: Option<String>,
    /// Creation time, used by the expiry sweeper.
    pub created_at: Instant,
    /// Resolved lazily by the locate stage; reused by every later radius.
    pub coordinates: Option<Coordinates>,
    /// Immutable settings snapshot.
    pub settings: JobSettings,
    /// Mutable feature-flag set.
    pub flags: FeatureFlags,
    /// Theme currently applied (starts as `settings.theme`, switchable).
    pub active_theme: String,
    /// One slot per enumerated radius.
    pub slots: BTreeMap<Radius, SlotState>,
    /// Radius whose artifact is the job's current output.
    pub active_radius: Radius,
    /// URL of the active artifact; present only once the job is complete.
    pub artifact_url: Option<String>,
    /// Monotone render counter feeding artifact file names.
    render_seq: u64,
    /// Cancellation token observed by every stage and background task.
    cancel: CancellationToken,
}

impl JobRecord {
    /// Creates a fresh record in `Starting` state with empty slots.
    pub fn new(id: JobId, settings: JobSettings, policy: &RadiusPolicy, cancel: CancellationToken) -> Self {
        let slots = Radius::ALL
            .into_iter()
            .map(|r| {
                let state = if policy.is_locked(r) {
                    SlotState::Locked
                } else {
                    SlotState::Pending
                };
                (r, state)
            })
            .collect();

        let active_theme = settings.theme.clone();
        let active_radius = settings.initial_radius;
        Self {
            id,
            status: JobStatus::Starting,
            step: 0,
            percent: 0,
            message: "Starting".to_string(),
            error: None,
            created_at: Instant::now(),
            coordinates: None,
            settings,
            flags: FeatureFlags::default(),
            active_theme,
            slots,
            active_radius,
            artifact_url: None,
            render_seq: 0,
            cancel,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns a clone of the job's cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Enters `Running` when the locate stage begins. Idempotent.
    pub fn begin_running(&mut self) {
        if self.status == JobStatus::Starting {
            self.status = JobStatus::Running;
        }
    }

    /// Updates step, percent, and message.
    ///
    /// No-op once terminal. Percent and step never decrease; percent is
    /// capped at 99 here - only [`complete`](Self::complete) reaches 100.
    pub fn set_progress(&mut self, step: u8, percent: u8, message: &str) {
        if self.is_terminal() {
            return;
        }
        self.step = self.step.max(step.min(TOTAL_STEPS));
        self.percent = self.percent.max(percent.min(99));
        self.message = message.to_string();
    }

    /// Raises percent without touching step or message (progress ticks).
    pub fn bump_percent(&mut self, percent: u8) {
        if self.is_terminal() {
            return;
        }
        self.percent = self.percent.max(percent.min(99));
    }

    /// Marks the job failed with a cause. No-op once terminal.
    pub fn fail(&mut self, cause: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.error = Some(cause.into());
        self.message = "Failed".to_string();
    }

    /// Marks the job cancelled and fires its token. No-op once terminal.
    ///
    /// Returns true when the transition happened.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.message = "Cancelled".to_string();
        self.cancel.cancel();
        true
    }

    /// Completes the job with `radius` as the active slot.
    ///
    /// Enforces the completion invariant: the transition only happens when
    /// that slot is actually ready. Returns true when the job completed.
    pub fn complete(&mut self, radius: Radius) -> bool {
        if self.is_terminal() {
            return false;
        }
        let Some(url) = self.slots.get(&radius).and_then(|s| s.artifact_url()) else {
            return false;
        };
        self.artifact_url = Some(url.to_string());
        self.active_radius = radius;
        self.status = JobStatus::Complete;
        self.step = TOTAL_STEPS;
        self.percent = 100;
        self.message = "Done".to_string();
        true
    }

    /// Claims a slot for loading (`Pending -> Loading`), exactly once.
    ///
    /// Returns false when the slot is locked, already claimed, already
    /// ready, or the job can no longer make progress (`Error`/`Cancelled`).
    pub fn claim_slot(&mut self, radius: Radius) -> bool {
        if matches!(self.status, JobStatus::Error | JobStatus::Cancelled) {
            return false;
        }
        match self.slots.get_mut(&radius) {
            Some(state @ SlotState::Pending) => {
                *state = SlotState::Loading;
                true
            }
            _ => false,
        }
    }

    /// Writes a slot state.
    ///
    /// Allowed while `Complete` (widen keeps filling slots after the
    /// user-visible result), refused after `Error`/`Cancelled`.
    pub fn set_slot(&mut self, radius: Radius, state: SlotState) {
        if matches!(self.status, JobStatus::Error | JobStatus::Cancelled) {
            return;
        }
        self.slots.insert(radius, state);
    }

    pub fn slot(&self, radius: Radius) -> Option<&SlotState> {
        self.slots.get(&radius)
    }

    /// Next render sequence number for artifact naming.
    pub fn next_render_seq(&mut self) -> u64 {
        self.render_seq += 1;
        self.render_seq
    }

    /// Takes a client-facing snapshot of this record.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status.into(),
            step: self.step,
            total_steps: TOTAL_STEPS,
            percent: self.percent,
            message: self.message.clone(),
            error: self.error.clone(),
            coordinates: self.coordinates,
            active_radius: Some(self.active_radius),
            artifact_url: self.artifact_url.clone(),
            slots: self
                .slots
                .iter()
                .map(|(r, s)| {
                    (
                        *r,
                        SlotSummary {
                            status: s.status(),
                            artifact_url: s.artifact_url().map(str::to_string),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Status reported in snapshots.
///
/// Extends [`JobStatus`] with `NotFound` so polling an unknown or expired
/// job still yields a well-formed snapshot instead of a transport fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    Starting,
    Running,
    Complete,
    Error,
    Cancelled,
    NotFound,
}

impl From<JobStatus> for ReportedStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Starting => ReportedStatus::Starting,
            JobStatus::Running => ReportedStatus::Running,
            JobStatus::Complete => ReportedStatus::Complete,
            JobStatus::Error => ReportedStatus::Error,
            JobStatus::Cancelled => ReportedStatus::Cancelled,
        }
    }
}

/// Per-slot summary exposed in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub status: SlotStatus,
    pub artifact_url: Option<String>,
}

/// Client-facing view of a job, returned by every status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: ReportedStatus,
    pub step: u8,
    pub total_steps: u8,
    pub percent: u8,
    pub message: String,
    pub error: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub active_radius: Option<Radius>,
    pub artifact_url: Option<String>,
    pub slots: BTreeMap<Radius, SlotSummary>,
}

impl JobSnapshot {
    /// Well-formed snapshot for an unknown job identifier.
    pub fn not_found(id: JobId) -> Self {
        Self {
            id,
            status: ReportedStatus::NotFound,
            step: 0,
            total_steps: TOTAL_STEPS,
            percent: 0,
            message: "Job not found".to_string(),
            error: None,
            coordinates: None,
            active_radius: None,
            artifact_url: None,
            slots: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::RoadCategory;

    fn record() -> JobRecord {
        JobRecord::new(
            JobId::new(),
            JobSettings::new("Prague", "noir"),
            &RadiusPolicy::default(),
            CancellationToken::new(),
        )
    }

    fn ready_state(url: &str) -> SlotState {
        use crate::render::RenderParams;
        use std::sync::Arc;
        SlotState::Ready(slot::SlotData {
            roads: Arc::new(crate::geo::RoadNetwork::default()),
            water: Arc::new(crate::geo::FeatureSet::empty()),
            parks: Arc::new(crate::geo::FeatureSet::empty()),
            params: RenderParams::derive(Radius::Km3, 12.0, 16.0),
            artifact_url: url.to_string(),
        })
    }

    #[test]
    fn test_job_id_is_eight_hex_chars() {
        let id = JobId::new();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_job_ids_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_new_record_starting_with_policy_slots() {
        let job = record();
        assert_eq!(job.status, JobStatus::Starting);
        assert_eq!(job.percent, 0);
        assert!(matches!(job.slot(Radius::Km3), Some(SlotState::Pending)));
        assert!(matches!(job.slot(Radius::Km20), Some(SlotState::Locked)));
    }

    #[test]
    fn test_progress_is_monotone() {
        let mut job = record();
        job.begin_running();
        job.set_progress(2, 40, "Downloading streets");
        job.set_progress(1, 5, "Finding location"); // stale update

        assert_eq!(job.step, 2);
        assert_eq!(job.percent, 40);
    }

    #[test]
    fn test_progress_capped_below_complete() {
        let mut job = record();
        job.begin_running();
        job.set_progress(5, 120, "Rendering map");
        assert_eq!(job.percent, 99);
    }

    #[test]
    fn test_terminal_record_is_frozen() {
        let mut job = record();
        job.begin_running();
        job.fail("fetch failed");

        job.set_progress(5, 90, "Rendering map");
        job.bump_percent(95);
        assert_eq!(job.percent, 0);
        assert_eq!(job.message, "Failed");
        assert!(!job.mark_cancelled());
    }

    #[test]
    fn test_claim_slot_exactly_once() {
        let mut job = record();
        assert!(job.claim_slot(Radius::Km3));
        assert!(!job.claim_slot(Radius::Km3)); // already loading
        assert!(!job.claim_slot(Radius::Km20)); // locked
    }

    #[test]
    fn test_claim_refused_after_cancel() {
        let mut job = record();
        job.mark_cancelled();
        assert!(!job.claim_slot(Radius::Km5));
    }

    #[test]
    fn test_complete_requires_ready_slot() {
        let mut job = record();
        job.begin_running();

        // No slot is ready yet: completion must refuse
        assert!(!job.complete(Radius::Km3));
        assert_eq!(job.status, JobStatus::Running);

        job.claim_slot(Radius::Km3);
        job.set_slot(Radius::Km3, ready_state("/posters/p.png"));
        assert!(job.complete(Radius::Km3));
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.percent, 100);
        assert_eq!(job.artifact_url.as_deref(), Some("/posters/p.png"));
    }

    #[test]
    fn test_slots_writable_while_complete() {
        let mut job = record();
        job.begin_running();
        job.claim_slot(Radius::Km3);
        job.set_slot(Radius::Km3, ready_state("/posters/a.png"));
        job.complete(Radius::Km3);

        // Widen continues after completion
        assert!(job.claim_slot(Radius::Km5));
        job.set_slot(Radius::Km5, ready_state("/posters/b.png"));
        assert!(job.slot(Radius::Km5).unwrap().is_ready());
    }

    #[test]
    fn test_cancel_fires_token() {
        let mut job = record();
        let token = job.cancel_token();
        assert!(!token.is_cancelled());
        assert!(job.mark_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_flag_delta_partial_merge() {
        let mut flags = FeatureFlags::default();
        let delta = FlagDelta {
            water: Some(false),
            footway: Some(false),
            ..FlagDelta::default()
        };
        delta.apply(&mut flags);

        assert!(!flags.water);
        assert!(!flags.footway);
        assert!(flags.parks); // untouched
        assert!(flags.motorway);
    }

    #[test]
    fn test_flag_delta_from_partial_json() {
        let delta: FlagDelta = serde_json::from_str(r#"{"water": false}"#).unwrap();
        assert_eq!(delta.water, Some(false));
        assert_eq!(delta.parks, None);
    }

    #[test]
    fn test_enabled_road_categories() {
        let mut flags = FeatureFlags::default();
        flags.motorway = false;
        flags.footway = false;

        let enabled = flags.enabled_road_categories();
        assert_eq!(enabled.len(), 4);
        assert!(!enabled.contains(&RoadCategory::Motorway));
        assert!(enabled.contains(&RoadCategory::Primary));
    }

    #[test]
    fn test_all_roads_off_yields_empty_set() {
        let flags = FeatureFlags {
            motorway: false,
            primary: false,
            secondary: false,
            tertiary: false,
            residential: false,
            footway: false,
            ..FeatureFlags::default()
        };
        assert!(flags.enabled_road_categories().is_empty());
    }

    #[test]
    fn test_settings_dimensions_clamped() {
        let settings = JobSettings::new("Prague", "noir").with_dimensions(1.0, 48.0);
        assert_eq!(settings.width_in, MIN_DIMENSION_IN);
        assert_eq!(settings.height_in, MAX_DIMENSION_IN);
    }

    #[test]
    fn test_not_found_snapshot_is_well_formed() {
        let snap = JobSnapshot::not_found(JobId::from_raw("deadbeef"));
        assert_eq!(snap.status, ReportedStatus::NotFound);
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.message, "Job not found");

        // And serializes cleanly for the HTTP layer
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], "not_found");
    }
}
