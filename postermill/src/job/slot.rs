//! Radius slots: per-radius cached state within a job.
//!
//! Each job owns one slot per enumerated radius. A slot caches the fetched
//! datasets and derived render parameters so feature-toggle and theme-switch
//! re-renders never re-fetch. The state is a tagged variant, which makes
//! "ready with no data" unrepresentable.

use crate::geo::{FeatureSet, RoadNetwork};
use crate::render::RenderParams;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Geographic extent of one poster, from the fixed radius set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radius {
    Km3,
    Km5,
    Km10,
    Km15,
    Km20,
}

impl Radius {
    /// All radii, smallest first. This is also the widen order.
    pub const ALL: [Radius; 5] = [
        Radius::Km3,
        Radius::Km5,
        Radius::Km10,
        Radius::Km15,
        Radius::Km20,
    ];

    /// Radius in meters.
    pub fn meters(&self) -> u32 {
        match self {
            Radius::Km3 => 3_000,
            Radius::Km5 => 5_000,
            Radius::Km10 => 10_000,
            Radius::Km15 => 15_000,
            Radius::Km20 => 20_000,
        }
    }

    /// Parses a radius from meters.
    pub fn from_meters(meters: u32) -> Option<Self> {
        Radius::ALL.into_iter().find(|r| r.meters() == meters)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Radius::Km3 => "3km",
            Radius::Km5 => "5km",
            Radius::Km10 => "10km",
            Radius::Km15 => "15km",
            Radius::Km20 => "20km",
        }
    }
}

impl std::fmt::Display for Radius {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cached contents of a ready slot.
///
/// Datasets are immutable once populated; every re-render of this radius
/// shares them via `Arc` until the job is expired.
#[derive(Debug, Clone)]
pub struct SlotData {
    /// Primary dataset: the street network.
    pub roads: Arc<RoadNetwork>,
    /// Water polygons (may be empty).
    pub water: Arc<FeatureSet>,
    /// Park polygons (may be empty).
    pub parks: Arc<FeatureSet>,
    /// Viewport values derived once for this radius.
    pub params: RenderParams,
    /// URL of the most recent render of this slot.
    pub artifact_url: String,
}

/// Lifecycle state of a radius slot.
///
/// `Pending -> Loading -> {Ready, Error}`; `Locked` slots never leave
/// `Locked` without an explicit unlock (out of scope here). A slot is
/// claimed (`Pending -> Loading`) exactly once.
#[derive(Debug, Clone)]
pub enum SlotState {
    /// Restricted radius, unavailable without entitlement.
    Locked,
    /// Available but not yet claimed by an executor.
    Pending,
    /// Claimed; fetch/render in flight.
    Loading,
    /// Populated and rendered at least once.
    Ready(SlotData),
    /// Fetch or initial render failed.
    Error {
        cause: String,
    },
}

impl SlotState {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, SlotState::Ready(_))
    }

    /// Returns the cached data for a ready slot.
    pub fn data(&self) -> Option<&SlotData> {
        match self {
            SlotState::Ready(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the last-rendered artifact URL, if any.
    pub fn artifact_url(&self) -> Option<&str> {
        self.data().map(|d| d.artifact_url.as_str())
    }

    /// Collapses the state to its status tag.
    pub fn status(&self) -> SlotStatus {
        match self {
            SlotState::Locked => SlotStatus::Locked,
            SlotState::Pending => SlotStatus::Pending,
            SlotState::Loading => SlotStatus::Loading,
            SlotState::Ready(_) => SlotStatus::Ready,
            SlotState::Error { .. } => SlotStatus::Error,
        }
    }
}

/// Status tag of a slot, without the cached payload.
///
/// This is what status snapshots expose to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Locked,
    Pending,
    Loading,
    Ready,
    Error,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Locked => "locked",
            SlotStatus::Pending => "pending",
            SlotStatus::Loading => "loading",
            SlotStatus::Ready => "ready",
            SlotStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
