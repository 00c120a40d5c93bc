use geo::{Centroid, Geometry, MultiPolygon, Point};
use serde_json::{Map, Value};

/// Polygonal part of a geometry, `None` if it has no polygon at all.
/// Non-polygonal members of a collection are dropped.
pub(crate) fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygons = match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.iter()
            .filter_map(polygonal)
            .flat_map(|mp| mp.0)
            .collect(),
        _ => Vec::new(),
    };
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

/// Representative point: points are kept, anything else is reduced to its centroid.
pub(crate) fn representative_point(geometry: &Geometry<f64>) -> Option<Point<f64>> {
    match geometry {
        Geometry::Point(p) => Some(*p),
        other => other.centroid(),
    }
}

/// Attribute rendered as text, `None` for absent, null or blank values.
///
/// Integral numbers render without decimals (`1021.0` -> `"1021"`), so category codes
/// compare equal whatever numeric type the source used.
pub(crate) fn property_text(properties: &Map<String, Value>, field: &str) -> Option<String> {
    match properties.get(field)? {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() { return Some(i.to_string()) }
            if let Some(u) = n.as_u64() { return Some(u.to_string()) }
            let f = n.as_f64()?;
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                Some(format!("{}", f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
