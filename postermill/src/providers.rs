//! Collaborator traits consumed by the pipeline.
//!
//! The pipeline depends on these abstractions for everything slow or
//! external: geocoding, geodata fetches, rendering, and theme lookup.
//! Production adapters (OSM fetchers, the raster renderer) implement them
//! outside this crate; tests substitute mocks.
//!
//! All async methods return `Send` futures so stage runs can execute inside
//! spawned tasks.

use crate::error::{FetchError, LocateError, RenderError, RequestError};
use crate::geo::{Coordinates, FeatureKind, FeatureSet, RoadCategory, RoadNetwork};
use crate::job::slot::Radius;
use crate::render::{RenderParams, RenderScene};
use crate::theme::Theme;
use std::future::Future;
use std::path::Path;

/// Resolves a place name to coordinates.
pub trait Locator: Send + Sync + 'static {
    /// Geocodes `place` ("Prague" or "Prague, Czech Republic").
    ///
    /// Fails with [`LocateError`] when the place cannot be resolved; the
    /// pipeline treats that as terminal for the job.
    fn locate(&self, place: &str) -> impl Future<Output = Result<Coordinates, LocateError>> + Send;
}

/// Fetches the primary dataset: the street network around a coordinate.
pub trait NetworkFetcher: Send + Sync + 'static {
    /// Downloads the road network within `radius` of `center`.
    ///
    /// `categories` is the set of road categories the caller wants in the
    /// dataset. Fetches are expensive; the pipeline issues at most one per
    /// radius slot and serves all re-renders from the cached result.
    fn fetch_roads(
        &self,
        center: Coordinates,
        radius: Radius,
        categories: &[RoadCategory],
    ) -> impl Future<Output = Result<RoadNetwork, FetchError>> + Send;
}

/// Fetches secondary datasets (water, parks).
pub trait FeatureFetcher: Send + Sync + 'static {
    /// Downloads the features of `kind` within `radius` of `center`.
    ///
    /// An empty [`FeatureSet`] is a valid result, not an error.
    fn fetch_features(
        &self,
        center: Coordinates,
        radius: Radius,
        kind: FeatureKind,
    ) -> impl Future<Output = Result<FeatureSet, FetchError>> + Send;
}

/// Renders a poster image to disk.
pub trait Renderer: Send + Sync + 'static {
    /// Renders `scene` with `theme` styling into `output`.
    ///
    /// Fails with [`RenderError`] on malformed geometry or I/O failure; the
    /// cached datasets stay usable for a retry.
    fn render(
        &self,
        scene: &RenderScene,
        theme: &Theme,
        params: &RenderParams,
        output: &Path,
    ) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Looks up style parameters by theme name.
///
/// Lookup is cheap (in-memory or a small file read), so this trait is
/// synchronous.
pub trait ThemeStore: Send + Sync + 'static {
    /// Loads the theme named `name`.
    ///
    /// Fails with [`RequestError::UnknownTheme`] for unknown names.
    fn load(&self, name: &str) -> Result<Theme, RequestError>;
}
