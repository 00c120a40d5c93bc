//! GeoJSON reading operations.

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{Map, Value};

use crate::source::{Feature, FeatureCollection};

/// Read a GeoJSON FeatureCollection (or a single Feature) from bytes.
pub(crate) fn read_feature_collection(bytes: &[u8], layer: &str) -> Result<FeatureCollection> {
    let value: Value = serde_json::from_slice(bytes)
        .with_context(|| format!("[io::geojson::read] Failed to parse GeoJSON for layer {layer}"))?;

    let crs = value.get("crs").and_then(parse_crs);
    let features = match value["type"].as_str() {
        Some("FeatureCollection") => value["features"].as_array()
            .ok_or_else(|| anyhow!("[io::geojson::read] FeatureCollection without a features array"))?
            .iter()
            .enumerate()
            .map(|(idx, feature)| parse_feature(feature)
                .with_context(|| format!("[io::geojson::read] Invalid feature {idx} in layer {layer}")))
            .collect::<Result<Vec<_>>>()?,
        Some("Feature") => vec![parse_feature(&value)?],
        other => bail!("[io::geojson::read] Expected a FeatureCollection, found {other:?}"),
    };

    Ok(FeatureCollection::new(layer, crs, features))
}

/// Parse the legacy `crs` member into an EPSG code.
/// Accepts `EPSG:n`, `urn:ogc:def:crs:EPSG::n`, `.../def/crs/EPSG/0/n` and CRS84.
pub(crate) fn parse_crs(crs: &Value) -> Option<u32> {
    let name = crs["properties"]["name"].as_str()?;
    if name.ends_with("CRS84") { return Some(4326) }
    name.rsplit([':', '/']).next()?.parse().ok()
}

fn parse_feature(value: &Value) -> Result<Feature> {
    let properties = match &value["properties"] {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => bail!("properties must be an object, found {other}"),
    };
    let geometry = match &value["geometry"] {
        Value::Null => None,
        geometry => Some(parse_geometry(geometry)?),
    };
    Ok(Feature { properties, geometry })
}

/// Parse a GeoJSON geometry object into a geo::Geometry.
pub(crate) fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    if value["type"].as_str() == Some("GeometryCollection") {
        let members = value["geometries"].as_array()
            .ok_or_else(|| anyhow!("GeometryCollection without geometries"))?
            .iter()
            .map(parse_geometry)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection::new_from(members)));
    }

    let coords = &value["coordinates"];
    Ok(match value["type"].as_str() {
        Some("Point") => Geometry::Point(Point::from(parse_position(coords)?)),
        Some("MultiPoint") => Geometry::MultiPoint(MultiPoint::new(
            array(coords)?.iter().map(|c| parse_position(c).map(Point::from)).collect::<Result<_>>()?
        )),
        Some("LineString") => Geometry::LineString(parse_line(coords)?),
        Some("MultiLineString") => Geometry::MultiLineString(MultiLineString::new(
            array(coords)?.iter().map(parse_line).collect::<Result<_>>()?
        )),
        Some("Polygon") => Geometry::Polygon(parse_polygon(coords)?),
        Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon::new(
            array(coords)?.iter().map(parse_polygon).collect::<Result<_>>()?
        )),
        other => bail!("unsupported geometry type {other:?}"),
    })
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("expected a coordinate array, found {value}"))
}

/// Parse a position `[x, y, ...]`; extra ordinates are ignored.
fn parse_position(value: &Value) -> Result<Coord<f64>> {
    let position = array(value)?;
    let ordinate = |i: usize| position.get(i)
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("invalid position {value}"));
    Ok(Coord { x: ordinate(0)?, y: ordinate(1)? })
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString::new(array(value)?.iter().map(parse_position).collect::<Result<_>>()?))
}

/// Parse polygon rings `[exterior, hole, hole, ...]`, closing rings that are left open.
fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?.iter()
        .map(|ring| {
            let mut points = array(ring)?.iter().map(parse_position).collect::<Result<Vec<_>>>()?;
            if !points.is_empty() && points[0] != points[points.len() - 1] {
                points.push(points[0]);
            }
            Ok(LineString::new(points))
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter();

    let exterior = rings.next().ok_or_else(|| anyhow!("polygon without exterior ring"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_collection_with_crs() {
        let doc = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::2056" } },
            "features": [
                {
                    "type": "Feature",
                    "properties": { "bs_art_txt": "Gebaeude.Gebaeude" },
                    "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 4], [0, 4]]] }
                },
                { "type": "Feature", "properties": null, "geometry": null }
            ]
        });

        let fc = read_feature_collection(doc.to_string().as_bytes(), "bb").unwrap();
        assert_eq!(fc.layer, "bb");
        assert_eq!(fc.crs, Some(2056));
        assert_eq!(fc.features.len(), 2);
        assert_eq!(fc.features[0].properties["bs_art_txt"], "Gebaeude.Gebaeude");
        let Some(Geometry::Polygon(polygon)) = &fc.features[0].geometry else { panic!("not a polygon") };
        assert_eq!(polygon.exterior().0.len(), 5, "ring should be closed");
        assert!(fc.features[1].geometry.is_none());
    }

    #[test]
    fn crs_names() {
        let name = |s: &str| json!({ "properties": { "name": s } });
        assert_eq!(parse_crs(&name("EPSG:2056")), Some(2056));
        assert_eq!(parse_crs(&name("urn:ogc:def:crs:OGC:1.3:CRS84")), Some(4326));
        assert_eq!(parse_crs(&name("http://www.opengis.net/def/crs/EPSG/0/21781")), Some(21781));
        assert_eq!(parse_crs(&name("nonsense")), None);
    }

    #[test]
    fn multi_geometries() {
        let mp = parse_geometry(&json!({
            "type": "MultiPolygon",
            "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]], [[[5, 5], [6, 5], [6, 6], [5, 5]]]]
        })).unwrap();
        assert!(matches!(mp, Geometry::MultiPolygon(ref m) if m.0.len() == 2));

        let gc = parse_geometry(&json!({
            "type": "GeometryCollection",
            "geometries": [{ "type": "Point", "coordinates": [1.5, 2.5, 99.0] }]
        })).unwrap();
        assert!(matches!(gc, Geometry::GeometryCollection(ref g) if g.0.len() == 1));
    }

    #[test]
    fn rejects_garbage() {
        assert!(read_feature_collection(b"{\"type\": \"Topology\"}", "x").is_err());
        assert!(parse_geometry(&json!({ "type": "Point", "coordinates": ["a", 1] })).is_err());
    }
}
