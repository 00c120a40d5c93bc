use std::cmp::Ordering;

use geo::{Area, BooleanOps, BoundingRect, Intersects};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::attribution::coverage::PCT_TOLERANCE;
use crate::attribution::stats::PctSummary;
use crate::geom::ShapeIndex;
use crate::store::{CategoryLayer, SurfacePolygon};

/// The single building category chosen for a building.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAssignment {
    pub id: u32,
    pub category_id: String,
    /// Share of the building covered by the winning category polygon, for buildings that
    /// touched several categories.
    pub pct_bldg: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub buildings: usize,
    /// Buildings without usable geometry.
    pub invalid_buildings: usize,
    /// Buildings intersecting at least one category polygon.
    pub joined_buildings: usize,
    pub unmatched: usize,
    pub mapped_unambiguous: usize,
    pub ambiguous: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub mapped_total: usize,
    pub pct_bldg: PctSummary,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryResolution {
    /// At most one row per building, in id order.
    pub assignments: Vec<CategoryAssignment>,
    /// Ambiguous buildings without any positive-area overlap.
    pub unresolved: Vec<u32>,
    pub stats: CategoryStats,
}

/// Assign each building one category id.
///
/// Buildings are joined to every category polygon they intersect. A building whose matches
/// all carry one category id takes that id. A building matching several ids takes the id of
/// the matched polygon covering the largest share of its area; ties (within the overlay's
/// rounding noise) go to the lowest id, compared numerically when both ids are integers.
/// Overlaps without area (shared edges, corners) never win, so a building touching its
/// other categories only along a boundary stays unresolved.
pub fn resolve_categories<'a>(
    buildings: impl IntoIterator<Item = &'a SurfacePolygon>,
    categories: &CategoryLayer,
) -> CategoryResolution {
    let index = ShapeIndex::new(categories.polygons.iter().map(|c| &c.geometry));
    let mut resolution = CategoryResolution::default();
    let stats = &mut resolution.stats;
    let mut pcts = Vec::new();

    for building in buildings {
        stats.buildings += 1;
        let Some(shape) = building.geometry.as_ref() else {
            stats.invalid_buildings += 1;
            continue;
        };

        let matches = shape.bounding_rect()
            .map(|rect| index.candidates(&rect))
            .unwrap_or_default()
            .into_iter()
            .filter(|&j| categories.polygons[j].geometry.intersects(shape))
            .collect::<SmallVec<[usize; 4]>>();

        if matches.is_empty() {
            stats.unmatched += 1;
            continue;
        }
        stats.joined_buildings += 1;

        let mut distinct = matches.iter()
            .map(|&j| categories.polygons[j].category_id.as_str())
            .collect::<SmallVec<[&str; 4]>>();
        distinct.sort_unstable();
        distinct.dedup();

        if let [category_id] = distinct.as_slice() {
            stats.mapped_unambiguous += 1;
            resolution.assignments.push(CategoryAssignment {
                id: building.id,
                category_id: category_id.to_string(),
                pct_bldg: None,
            });
            continue;
        }

        stats.ambiguous += 1;
        let building_area = shape.unsigned_area();
        let mut best: Option<(f64, &str)> = None;

        for &j in &matches {
            let candidate = &categories.polygons[j];
            let overlap = shape.intersection(&candidate.geometry).unsigned_area();
            if overlap <= 0.0 || building_area <= 0.0 { continue }

            let pct = overlap / building_area * 100.0;
            let better = match best {
                None => true,
                Some((best_pct, best_id)) => pct > best_pct + PCT_TOLERANCE
                    || (pct >= best_pct - PCT_TOLERANCE && code_order(&candidate.category_id, best_id).is_lt()),
            };
            if better { best = Some((pct, candidate.category_id.as_str())) }
        }

        match best {
            Some((pct, category_id)) => {
                stats.resolved += 1;
                pcts.push(pct);
                resolution.assignments.push(CategoryAssignment {
                    id: building.id,
                    category_id: category_id.to_string(),
                    pct_bldg: Some(pct),
                });
            }
            None => {
                debug!("[category] building {} touches {distinct:?} without overlap", building.id);
                stats.unresolved += 1;
                resolution.unresolved.push(building.id);
            }
        }
    }

    stats.mapped_total = resolution.assignments.len();
    stats.pct_bldg = PctSummary::from_values(pcts);

    info!(
        "[category] {} buildings: {} unambiguous, {} ambiguous ({} resolved, {} unresolved), {} unmatched",
        stats.buildings, stats.mapped_unambiguous, stats.ambiguous, stats.resolved, stats.unresolved, stats.unmatched,
    );

    resolution
}

/// Category codes are numeric in practice; anything else sorts as text.
fn code_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::store::CategoryPolygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]])
    }

    fn building(id: u32, shape: MultiPolygon<f64>) -> SurfacePolygon {
        SurfacePolygon { id, base_code: Some("Gebaeude.Gebaeude".into()), geometry: Some(shape) }
    }

    fn layer(polygons: &[(&str, MultiPolygon<f64>)]) -> CategoryLayer {
        CategoryLayer {
            epsg: 2056,
            polygons: polygons.iter()
                .map(|(id, shape)| CategoryPolygon { category_id: id.to_string(), geometry: shape.clone() })
                .collect(),
        }
    }

    #[test]
    fn largest_overlap_wins() {
        // 70% of the building lies in 1021, 30% in 1060.
        let categories = layer(&[("1060", rect(7.0, -5.0, 20.0, 15.0)), ("1021", rect(-5.0, -5.0, 7.0, 15.0))]);
        let buildings = vec![building(1, rect(0.0, 0.0, 10.0, 10.0))];

        let resolution = resolve_categories(&buildings, &categories);
        assert_eq!(resolution.assignments.len(), 1);
        let assignment = &resolution.assignments[0];
        assert_eq!(assignment.category_id, "1021");
        assert!((assignment.pct_bldg.unwrap() - 70.0).abs() < 1e-6);
        assert_eq!(resolution.stats.ambiguous, 1);
        assert_eq!(resolution.stats.resolved, 1);
    }

    #[test]
    fn same_category_twice_is_unambiguous() {
        let categories = layer(&[("1025", rect(-5.0, -5.0, 5.0, 15.0)), ("1025", rect(5.0, -5.0, 15.0, 15.0))]);
        let buildings = vec![building(7, rect(0.0, 0.0, 10.0, 10.0))];

        let resolution = resolve_categories(&buildings, &categories);
        assert_eq!(resolution.assignments, vec![CategoryAssignment { id: 7, category_id: "1025".into(), pct_bldg: None }]);
        assert_eq!(resolution.stats.mapped_unambiguous, 1);
        assert_eq!(resolution.stats.ambiguous, 0);
    }

    #[test]
    fn exact_tie_goes_to_lowest_id() {
        let categories = layer(&[("1060", rect(5.0, -5.0, 15.0, 15.0)), ("1030", rect(-5.0, -5.0, 5.0, 15.0))]);
        let buildings = vec![building(1, rect(0.0, 0.0, 10.0, 10.0))];

        let resolution = resolve_categories(&buildings, &categories);
        assert_eq!(resolution.assignments[0].category_id, "1030");
    }

    #[test]
    fn tie_compares_ids_as_numbers() {
        let categories = layer(&[("999", rect(5.0, -5.0, 15.0, 15.0)), ("1000", rect(-5.0, -5.0, 5.0, 15.0))]);
        let buildings = vec![building(1, rect(0.0, 0.0, 10.0, 10.0))];

        let resolution = resolve_categories(&buildings, &categories);
        assert_eq!(resolution.assignments[0].category_id, "999");
        assert_eq!(code_order("1000", "999"), Ordering::Greater);
        assert_eq!(code_order("10a", "999"), Ordering::Less);
    }

    #[test]
    fn even_split_at_survey_coordinates_is_a_tie() {
        const E: f64 = 2_611_000.0;
        const N: f64 = 1_267_000.0;

        for i in 0..50u32 {
            let x = E + f64::from(i) * 41.37 + 0.417;
            let y = N + f64::from(i % 11) * 19.03 + 0.293;
            let w = 6.0 + f64::from(i % 7) * 1.37;
            let (left, right) = (rect(x - 5.0, y - 5.0, x + w / 2.0, y + 15.0), rect(x + w / 2.0, y - 5.0, x + w + 5.0, y + 15.0));
            let categories = if i % 2 == 0 {
                layer(&[("1060", right), ("1030", left)])
            } else {
                layer(&[("1030", right), ("1060", left)])
            };
            let buildings = vec![building(i + 1, rect(x, y, x + w, y + 10.0))];

            let resolution = resolve_categories(&buildings, &categories);
            assert_eq!(resolution.assignments[0].category_id, "1030", "building {}", i + 1);
        }
    }

    #[test]
    fn unmatched_and_boundary_touches() {
        let categories = layer(&[("1021", rect(10.0, 0.0, 20.0, 10.0)), ("1080", rect(0.0, 10.0, 10.0, 20.0))]);
        let buildings = vec![
            // Shares one edge with each category: ambiguous, but no area in common.
            building(1, rect(0.0, 0.0, 10.0, 10.0)),
            building(2, rect(100.0, 100.0, 110.0, 110.0)),
            SurfacePolygon { id: 3, base_code: Some("Gebaeude.Gebaeude".into()), geometry: None },
        ];

        let resolution = resolve_categories(&buildings, &categories);
        assert!(resolution.assignments.is_empty());
        assert_eq!(resolution.unresolved, vec![1]);
        assert_eq!(resolution.stats.unmatched, 1);
        assert_eq!(resolution.stats.invalid_buildings, 1);
        assert_eq!(resolution.stats.pct_bldg, PctSummary::default());
    }

    #[test]
    fn at_most_one_row_per_building() {
        let categories = layer(&[
            ("1010", rect(0.0, 0.0, 50.0, 50.0)),
            ("1020", rect(20.0, 0.0, 50.0, 50.0)),
            ("1020", rect(0.0, 20.0, 50.0, 50.0)),
        ]);
        let buildings = (1..=5)
            .map(|i| building(i, rect(i as f64 * 8.0, i as f64 * 8.0, i as f64 * 8.0 + 5.0, i as f64 * 8.0 + 5.0)))
            .collect::<Vec<_>>();

        let resolution = resolve_categories(&buildings, &categories);
        let mut ids = resolution.assignments.iter().map(|a| a.id).collect::<Vec<_>>();
        let total = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(total, 5);
    }
}
