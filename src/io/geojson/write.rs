//! GeoJSON writing operations.

use anyhow::{Context, Result};
use geo::{Coord, Geometry, LineString, Polygon};
use serde_json::{json, Value};

use crate::source::FeatureCollection;

/// Serialize a FeatureCollection as an RFC 7946 GeoJSON value.
/// The `crs` member is only emitted for collections not in EPSG:4326.
pub(crate) fn feature_collection_to_value(collection: &FeatureCollection) -> Value {
    let features = collection.features.iter()
        .map(|feature| json!({
            "type": "Feature",
            "properties": feature.properties,
            "geometry": feature.geometry.as_ref().map_or(Value::Null, geometry_to_value),
        }))
        .collect::<Vec<_>>();

    let mut value = json!({
        "type": "FeatureCollection",
        "name": collection.layer,
        "features": features,
    });
    if let Some(epsg) = collection.crs.filter(|&epsg| epsg != 4326) {
        value["crs"] = json!({ "type": "name", "properties": { "name": format!("urn:ogc:def:crs:EPSG::{epsg}") } });
    }
    value
}

/// Serialize a FeatureCollection to GeoJSON bytes.
pub(crate) fn write_feature_collection_bytes(collection: &FeatureCollection) -> Result<Vec<u8>> {
    serde_json::to_vec(&feature_collection_to_value(collection))
        .context("[io::geojson::write] Failed to serialize GeoJSON to bytes")
}

/// Helper to convert a geo::Geometry to a serde_json::Value representing a GeoJSON geometry.
pub(crate) fn geometry_to_value(geometry: &Geometry<f64>) -> Value {
    fn position(c: &Coord<f64>) -> Value { json!([c.x, c.y]) }
    fn line(ls: &LineString<f64>) -> Value { ls.coords().map(position).collect() }
    fn rings(polygon: &Polygon<f64>) -> Value {
        std::iter::once(polygon.exterior()).chain(polygon.interiors()).map(line).collect()
    }

    match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": position(&p.0) }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(l) => json!({ "type": "LineString", "coordinates": [position(&l.start), position(&l.end)] }),
        Geometry::LineString(ls) => json!({ "type": "LineString", "coordinates": line(ls) }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.iter().map(line).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": rings(p) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.iter().map(rings).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => json!({ "type": "Polygon", "coordinates": rings(&r.to_polygon()) }),
        Geometry::Triangle(t) => json!({ "type": "Polygon", "coordinates": rings(&t.to_polygon()) }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.iter().map(geometry_to_value).collect::<Vec<_>>(),
        }),
    }
}
