//! Geodata model: coordinates, road networks, and secondary feature sets.
//!
//! These are the datasets the external fetchers return and the renderer
//! consumes. Once a radius slot caches them they are immutable; re-renders
//! work on filtered views derived via [`filter_roads`], never on re-fetched
//! data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.4}\u{b0} {} / {:.4}\u{b0} {}",
            self.lat.abs(),
            if self.lat >= 0.0 { 'N' } else { 'S' },
            self.lon.abs(),
            if self.lon >= 0.0 { 'E' } else { 'W' },
        )
    }
}

/// Category of a road edge, used for feature-flag filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadCategory {
    Motorway,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Footway,
}

impl RoadCategory {
    /// All categories, in rendering order (widest first).
    pub const ALL: [RoadCategory; 6] = [
        RoadCategory::Motorway,
        RoadCategory::Primary,
        RoadCategory::Secondary,
        RoadCategory::Tertiary,
        RoadCategory::Residential,
        RoadCategory::Footway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadCategory::Motorway => "motorway",
            RoadCategory::Primary => "primary",
            RoadCategory::Secondary => "secondary",
            RoadCategory::Tertiary => "tertiary",
            RoadCategory::Residential => "residential",
            RoadCategory::Footway => "footway",
        }
    }
}

impl std::fmt::Display for RoadCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One polyline of the street network.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    pub category: RoadCategory,
    /// Lon/lat vertices of the polyline.
    pub points: Vec<(f64, f64)>,
}

/// The primary dataset: a street network around a coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadNetwork {
    pub edges: Vec<RoadEdge>,
}

impl RoadNetwork {
    pub fn new(edges: Vec<RoadEdge>) -> Self {
        Self { edges }
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns the set of categories present in this network.
    pub fn categories(&self) -> BTreeSet<RoadCategory> {
        self.edges.iter().map(|e| e.category).collect()
    }
}

/// Derives a filtered view of a cached road network.
///
/// Keeps only edges whose category is in `enabled`. An empty `enabled` set
/// falls back to the full unfiltered dataset: rendering an empty map because
/// the client toggled every category off is never what they meant. The
/// fallback (and the no-op case where every present category is enabled)
/// reuses the cached allocation via `Arc::clone`.
pub fn filter_roads(roads: &Arc<RoadNetwork>, enabled: &BTreeSet<RoadCategory>) -> Arc<RoadNetwork> {
    if enabled.is_empty() {
        return Arc::clone(roads);
    }
    if roads.categories().is_subset(enabled) {
        return Arc::clone(roads);
    }
    Arc::new(RoadNetwork::new(
        roads
            .edges
            .iter()
            .filter(|e| enabled.contains(&e.category))
            .cloned()
            .collect(),
    ))
}

/// Kind of secondary feature dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Water,
    Parks,
}

impl FeatureKind {
    /// OSM tag filter for this feature kind.
    pub fn osm_tags(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            FeatureKind::Water => &[
                ("natural", "water"),
                ("natural", "bay"),
                ("natural", "strait"),
                ("waterway", "riverbank"),
            ],
            FeatureKind::Parks => &[("leisure", "park"), ("landuse", "grass")],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Water => "water",
            FeatureKind::Parks => "parks",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A closed polygon (exterior ring only).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
}

/// A secondary dataset (water bodies or parks).
///
/// An empty set is a valid result, not an error: plenty of places have no
/// water or parks within the requested radius.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub polygons: Vec<Polygon>,
}

impl FeatureSet {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Arc<RoadNetwork> {
        Arc::new(RoadNetwork::new(vec![
            RoadEdge {
                category: RoadCategory::Motorway,
                points: vec![(0.0, 0.0), (1.0, 1.0)],
            },
            RoadEdge {
                category: RoadCategory::Residential,
                points: vec![(0.5, 0.5), (0.6, 0.6)],
            },
            RoadEdge {
                category: RoadCategory::Residential,
                points: vec![(0.7, 0.7), (0.8, 0.8)],
            },
        ]))
    }

    #[test]
    fn test_coordinates_display() {
        let prague = Coordinates::new(50.0755, 14.4378);
        assert_eq!(format!("{}", prague), "50.0755\u{b0} N / 14.4378\u{b0} E");

        let buenos_aires = Coordinates::new(-34.6037, -58.3816);
        assert_eq!(
            format!("{}", buenos_aires),
            "34.6037\u{b0} S / 58.3816\u{b0} W"
        );
    }

    #[test]
    fn test_filter_roads_subset() {
        let roads = network();
        let enabled: BTreeSet<_> = [RoadCategory::Residential].into_iter().collect();

        let filtered = filter_roads(&roads, &enabled);

        assert_eq!(filtered.edge_count(), 2);
        assert!(filtered.categories().contains(&RoadCategory::Residential));
        assert!(!filtered.categories().contains(&RoadCategory::Motorway));
    }

    #[test]
    fn test_filter_roads_empty_set_falls_back_to_full_dataset() {
        let roads = network();
        let filtered = filter_roads(&roads, &BTreeSet::new());

        // The fallback must reuse the cached dataset, not clone it
        assert!(Arc::ptr_eq(&roads, &filtered));
        assert_eq!(filtered.edge_count(), 3);
    }

    #[test]
    fn test_filter_roads_all_enabled_reuses_cache() {
        let roads = network();
        let enabled: BTreeSet<_> = RoadCategory::ALL.into_iter().collect();

        let filtered = filter_roads(&roads, &enabled);
        assert!(Arc::ptr_eq(&roads, &filtered));
    }

    #[test]
    fn test_feature_kind_tags() {
        assert!(FeatureKind::Water
            .osm_tags()
            .contains(&("waterway", "riverbank")));
        assert!(FeatureKind::Parks.osm_tags().contains(&("leisure", "park")));
    }

    #[test]
    fn test_feature_set_empty_is_valid() {
        let set = FeatureSet::empty();
        assert!(set.is_empty());
    }

    #[test]
    fn test_road_category_display() {
        assert_eq!(format!("{}", RoadCategory::Footway), "footway");
    }
}
