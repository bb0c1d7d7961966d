//! Render parameters, scene assembly, and artifact naming.
//!
//! [`RenderParams`] holds the viewport values derived exactly once per radius
//! slot and reused by every subsequent re-render of that slot. The scene is
//! the filtered view of the cached datasets that the renderer consumes.

use crate::geo::{Coordinates, FeatureSet, RoadNetwork};
use crate::job::slot::Radius;
use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Crop extents in meters relative to the map center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropLimits {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Viewport values derived once per radius slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderParams {
    /// Requested radius compensated for the poster aspect ratio.
    pub compensated_distance_m: f64,
    /// Crop window around the center, in meters.
    pub crop: CropLimits,
    /// Typography scale relative to a 12-inch baseline.
    pub scale_factor: f64,
}

impl RenderParams {
    /// Derives render parameters for a radius and poster dimensions.
    ///
    /// The compensated distance widens the fetch/crop extent so the longer
    /// poster edge is still covered: `dist * (max(w,h) / min(w,h)) / 4`.
    pub fn derive(radius: Radius, width_in: f64, height_in: f64) -> Self {
        let dist = radius.meters() as f64;
        let long = width_in.max(height_in);
        let short = width_in.min(height_in);
        let compensated = dist * (long / short) / 4.0;

        let y_half = compensated * (height_in / width_in);
        Self {
            compensated_distance_m: compensated,
            crop: CropLimits {
                x_min: -compensated,
                x_max: compensated,
                y_min: -y_half,
                y_max: y_half,
            },
            scale_factor: short / 12.0,
        }
    }
}

/// Everything the renderer needs for one poster: filtered datasets plus the
/// title block. Datasets are shared references into the slot cache.
#[derive(Debug, Clone)]
pub struct RenderScene {
    /// Label printed on the poster (the place name as submitted).
    pub place_label: String,
    /// Center coordinates, printed under the label.
    pub coordinates: Coordinates,
    /// Road edges to draw, already filtered by feature flags.
    pub roads: Arc<RoadNetwork>,
    /// Water polygons; `None` when the water flag is off.
    pub water: Option<Arc<FeatureSet>>,
    /// Park polygons; `None` when the parks flag is off.
    pub parks: Option<Arc<FeatureSet>>,
}

/// Slugifies a place name for use in artifact file names.
///
/// Lowercases, drops commas, and replaces whitespace with underscores
/// ("San Francisco, USA" becomes "san_francisco_usa").
pub fn place_slug(place: &str) -> String {
    place
        .to_lowercase()
        .replace(',', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Builds the artifact file name for one render.
///
/// The render sequence number makes every re-render produce a distinct
/// artifact, so clients can cache-bust by URL.
pub fn artifact_file_name(
    slug: &str,
    theme: &str,
    radius: Radius,
    job_id: &JobId,
    seq: u64,
) -> String {
    format!("{slug}_{theme}_{radius}_{job_id}_r{seq}.png")
}
