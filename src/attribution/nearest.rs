use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::geom::ShapeIndex;
use crate::store::{PointFeature, SurfacePolygon};

/// The point chosen for a building and its distance to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestMatch {
    pub id: u32,
    pub label: String,
    pub distance: f64,
}

/// Building id -> closest labelled point.
pub type NearestMapping = BTreeMap<u32, NearestMatch>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NearestStats {
    pub max_distance: f64,
    pub points_considered: usize,
    pub points_without_label: usize,
    pub buildings_matched: usize,
    pub buildings_within_cutoff: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearestResult {
    /// Every building some point was nearest to.
    pub full: NearestMapping,
    /// The subset of `full` within the distance cutoff.
    pub filtered: NearestMapping,
    pub stats: NearestStats,
}

/// Assign every labelled point to its nearest building, then keep one point per building.
///
/// Distances are planar, so points and buildings must share a metric CRS. Equidistant
/// buildings go to the lowest id; among the points of one building the closest wins and ties
/// keep the earlier point. A `max_distance` of zero keeps only points inside or on a building.
pub fn assign_nearest<'a>(
    points: &[PointFeature],
    buildings: impl IntoIterator<Item = &'a SurfacePolygon>,
    max_distance: f64,
) -> NearestResult {
    let buildings = buildings.into_iter()
        .filter_map(|b| b.geometry.as_ref().map(|shape| (b.id, shape)))
        .collect::<Vec<_>>();
    let index = ShapeIndex::new(buildings.iter().map(|&(_, shape)| shape));

    let mut result = NearestResult::default();
    result.stats.max_distance = max_distance;

    for point in points {
        let Some(label) = point.label.as_ref() else {
            result.stats.points_without_label += 1;
            continue;
        };
        result.stats.points_considered += 1;

        // Positions follow id order, so the lowest position is the lowest id.
        let Some((idx, distance)) = index.nearest(&point.geometry, |i| buildings[i].1) else { continue };
        let id = buildings[idx].0;

        let closer = result.full.get(&id).is_none_or(|current| distance < current.distance);
        if closer {
            result.full.insert(id, NearestMatch { id, label: label.clone(), distance });
        }
    }

    result.filtered = result.full.iter()
        .filter(|(_, m)| m.distance <= max_distance)
        .map(|(&id, m)| (id, m.clone()))
        .collect();

    result.stats.buildings_matched = result.full.len();
    result.stats.buildings_within_cutoff = result.filtered.len();

    info!(
        "[nearest] {} points -> {} buildings, {} within {} m ({} points without label)",
        result.stats.points_considered, result.stats.buildings_matched,
        result.stats.buildings_within_cutoff, max_distance, result.stats.points_without_label,
    );

    result
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon, Point};

    use super::*;

    fn building(id: u32, x: f64, y: f64) -> SurfacePolygon {
        let shape = MultiPolygon::new(vec![polygon![
            (x: x, y: y), (x: x + 10.0, y: y), (x: x + 10.0, y: y + 10.0), (x: x, y: y + 10.0), (x: x, y: y),
        ]]);
        SurfacePolygon { id, base_code: Some("Gebaeude.Gebaeude".into()), geometry: Some(shape) }
    }

    fn point(label: Option<&str>, x: f64, y: f64) -> PointFeature {
        PointFeature { label: label.map(str::to_string), geometry: Point::new(x, y) }
    }

    #[test]
    fn duplicate_points_yield_one_row() {
        let buildings = vec![building(1, 0.0, 0.0)];
        let points = vec![point(Some("Kino"), 5.0, 5.0), point(Some("Kino"), 5.0, 5.0)];

        let result = assign_nearest(&points, &buildings, 30.0);
        assert_eq!(result.full.len(), 1);
        assert_eq!(result.filtered[&1], NearestMatch { id: 1, label: "Kino".into(), distance: 0.0 });
    }

    #[test]
    fn closest_point_wins_and_ties_keep_input_order() {
        let buildings = vec![building(1, 0.0, 0.0)];
        let points = vec![
            point(Some("Theater"), 14.0, 5.0),
            point(Some("Museum"), 12.0, 5.0),
            point(Some("Bibliothek"), -2.0, 5.0),
        ];

        let result = assign_nearest(&points, &buildings, 30.0);
        assert_eq!(result.full[&1].label, "Museum");
        assert!((result.full[&1].distance - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_cutoff_requires_containment() {
        let buildings = vec![building(1, 0.0, 0.0), building(2, 50.0, 0.0)];
        let points = vec![
            point(Some("Primarschule"), 5.0, 10.0),
            point(Some("Kindergarten"), 65.0, 5.0),
            point(None, 55.0, 5.0),
        ];

        let result = assign_nearest(&points, &buildings, 0.0);
        assert_eq!(result.full.len(), 2);
        assert_eq!(result.filtered.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(result.stats.points_without_label, 1);
        assert_eq!(result.stats.buildings_within_cutoff, 1);
    }

    #[test]
    fn buildings_without_geometry_are_ignored() {
        let mut hollow = building(1, 0.0, 0.0);
        hollow.geometry = None;
        let buildings = vec![hollow, building(2, 40.0, 0.0)];

        let result = assign_nearest(&[point(Some("Kino"), 5.0, 5.0)], &buildings, 100.0);
        assert_eq!(result.full.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert!((result.full[&2].distance - 35.0).abs() < 1e-9);
    }

    #[test]
    fn no_buildings_no_matches() {
        let result = assign_nearest(&[point(Some("Kino"), 0.0, 0.0)], &[], 30.0);
        assert!(result.full.is_empty());
        assert_eq!(result.stats.points_considered, 1);
    }
}
