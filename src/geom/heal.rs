use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon, Validation};

use crate::geom::dissolve;

/// Reject geometries carrying NaN or infinite coordinates.
pub(crate) fn check_finite(shape: &MultiPolygon<f64>) -> Result<(), String> {
    let finite = shape.0.iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .flat_map(|ring| ring.coords())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if finite { Ok(()) } else { Err("non-finite coordinate".to_string()) }
}

/// Best-effort repair of a MultiPolygon.
///
/// Repeated vertices are collapsed, rings are closed and rings with fewer than three distinct
/// vertices are dropped. Parts that still fail validation are re-noded by an overlay pass,
/// which splits self-intersections, and overlapping parts are merged. The result may be empty
/// when the input has no area.
pub(crate) fn heal(shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, String> {
    check_finite(shape)?;

    let cleaned = shape.0.iter()
        .filter_map(clean_polygon)
        .collect::<Vec<_>>();
    if cleaned.is_empty() {
        return Err("no ring with at least three distinct vertices".to_string());
    }

    let cleaned = MultiPolygon::new(cleaned);
    if cleaned.is_valid() { return Ok(cleaned) }

    let empty = MultiPolygon::<f64>::new(Vec::new());
    let parts = cleaned.0.iter()
        .map(|polygon| if polygon.is_valid() {
            MultiPolygon::new(vec![polygon.clone()])
        } else {
            polygon.union(&empty)
        })
        .collect::<Vec<_>>();

    Ok(dissolve(&parts))
}

/// Clean the rings of a polygon; `None` if the exterior ring degenerates.
fn clean_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let exterior = clean_ring(polygon.exterior())?;
    let interiors = polygon.interiors().iter().filter_map(clean_ring).collect();
    Some(Polygon::new(exterior, interiors))
}

fn clean_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len() + 1);
    for &c in ring.coords() {
        if coords.last() != Some(&c) { coords.push(c) }
    }
    if coords.len() > 1 && coords.first() == coords.last() { coords.pop(); }
    if coords.len() < 3 { return None }

    coords.push(coords[0]);
    Some(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use geo::{polygon, Area};

    use super::*;

    #[test]
    fn valid_polygon_is_kept() {
        let shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0),
        ]]);
        let healed = heal(&shape).unwrap();
        assert_eq!(healed, shape);
    }

    #[test]
    fn repeated_vertices_are_collapsed() {
        let shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0),
            (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0),
        ]]);
        let healed = heal(&shape).unwrap();
        assert_eq!(healed.0[0].exterior().0.len(), 5);
        assert!((healed.unsigned_area() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn bowtie_is_split() {
        // Self-intersecting ring; the signed area of the raw ring cancels to zero.
        let shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]]);
        let healed = heal(&shape).unwrap();
        assert!((healed.unsigned_area() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn non_finite_is_rejected() {
        let shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0),
        ]]);
        assert!(heal(&shape).is_err());
    }

    #[test]
    fn degenerate_ring_is_rejected() {
        let shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0),
        ]]);
        assert!(heal(&shape).is_err());
    }
}
