use geo::{MultiPolygon, Point};
use serde::Serialize;
use tracing::debug;

use crate::error::AttributionResult;
use crate::geom::{check_finite, Projector};
use crate::source::FeatureCollection;
use crate::store::convert::{polygonal, property_text, representative_point};

/// A feature whose geometry could not be used, kept for the run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidGeometry {
    pub layer: String,
    /// Position of the feature within its source layer, if it failed at ingest.
    pub feature: Option<usize>,
    /// Surface polygon id, for features of the base layer.
    pub id: Option<u32>,
    pub reason: String,
}

/// What happened to the features of one ingested collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub accepted: usize,
    /// Features dropped for missing attributes or geometry.
    pub skipped: usize,
    pub invalid: Vec<InvalidGeometry>,
}

/// Projector from the CRS a collection declares into `epsg`; collections without a CRS
/// are assumed to be in `epsg` already.
fn projector_for(collection: &FeatureCollection, epsg: u32) -> AttributionResult<Projector> {
    Projector::new(collection.crs.unwrap_or(epsg), epsg)
}

/// Project a polygon and check its coordinates.
fn project_shape(projector: &Projector, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, String> {
    let projected = projector.project(shape).map_err(|e| e.to_string())?;
    check_finite(&projected)?;
    Ok(projected)
}

/// One base land-cover feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePolygon {
    /// 1-based ingest sequence number; the join key of the whole pipeline.
    pub id: u32,
    pub base_code: Option<String>,
    pub geometry: Option<MultiPolygon<f64>>,
}

/// The base land-cover layer, concatenated from its source collections.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLayer {
    pub epsg: u32,
    pub polygons: Vec<SurfacePolygon>,
}

impl SurfaceLayer {
    pub fn new(epsg: u32) -> Self {
        Self { epsg, polygons: Vec::new() }
    }

    /// Build a layer from already-projected rows, numbering them 1, 2, ...
    pub fn from_rows(epsg: u32, rows: Vec<(Option<String>, Option<MultiPolygon<f64>>)>) -> Self {
        let polygons = rows.into_iter()
            .zip(1..)
            .map(|((base_code, geometry), id)| SurfacePolygon { id, base_code, geometry })
            .collect();
        Self { epsg, polygons }
    }

    #[inline] pub fn len(&self) -> usize { self.polygons.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.polygons.is_empty() }

    /// Polygon by id.
    pub fn get(&self, id: u32) -> Option<&SurfacePolygon> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.polygons.get(idx)
    }

    /// Polygons whose base code equals `code`, in id order.
    pub fn subset<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a SurfacePolygon> + 'a {
        self.polygons.iter().filter(move |p| p.base_code.as_deref() == Some(code))
    }

    /// Append the features of a collection, continuing the id sequence.
    /// Every feature receives an id, even when its geometry is unusable.
    pub fn extend(&mut self, collection: &FeatureCollection, code_field: &str) -> AttributionResult<IngestReport> {
        let projector = projector_for(collection, self.epsg)?;
        let mut report = IngestReport::default();

        for (feature_idx, feature) in collection.features.iter().enumerate() {
            let Some(id) = next_id(self.polygons.len()) else {
                report.skipped += 1;
                report.invalid.push(InvalidGeometry {
                    layer: collection.layer.clone(),
                    feature: Some(feature_idx),
                    id: None,
                    reason: "id sequence exhausted".into(),
                });
                continue;
            };
            let geometry = match feature.geometry.as_ref().map(polygonal) {
                None => Err("missing geometry".to_string()),
                Some(None) => Err("geometry is not polygonal".to_string()),
                Some(Some(shape)) => project_shape(&projector, &shape),
            };

            let geometry = match geometry {
                Ok(shape) => { report.accepted += 1; Some(shape) }
                Err(reason) => {
                    debug!("[store] {} feature {feature_idx} (id {id}): {reason}", collection.layer);
                    report.invalid.push(InvalidGeometry {
                        layer: collection.layer.clone(),
                        feature: Some(feature_idx),
                        id: Some(id),
                        reason,
                    });
                    None
                }
            };

            self.polygons.push(SurfacePolygon {
                id,
                base_code: property_text(&feature.properties, code_field),
                geometry,
            });
        }

        Ok(report)
    }
}

/// Id of the polygon appended after `len` others; ids are 1-based.
#[inline]
fn next_id(len: usize) -> Option<u32> {
    u32::try_from(len).ok()?.checked_add(1)
}

/// An administrative building-use zone.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPolygon {
    pub category_id: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLayer {
    pub epsg: u32,
    pub polygons: Vec<CategoryPolygon>,
}

impl CategoryLayer {
    pub fn new(epsg: u32) -> Self {
        Self { epsg, polygons: Vec::new() }
    }

    /// Append the features of a collection. Features without a category id are skipped.
    pub fn extend(&mut self, collection: &FeatureCollection, id_field: &str) -> AttributionResult<IngestReport> {
        let projector = projector_for(collection, self.epsg)?;
        let mut report = IngestReport::default();

        for (feature_idx, feature) in collection.features.iter().enumerate() {
            let Some(category_id) = property_text(&feature.properties, id_field) else {
                report.skipped += 1;
                continue;
            };
            let Some(shape) = feature.geometry.as_ref().and_then(polygonal) else {
                report.skipped += 1;
                continue;
            };

            match project_shape(&projector, &shape) {
                Ok(geometry) => {
                    report.accepted += 1;
                    self.polygons.push(CategoryPolygon { category_id, geometry });
                }
                Err(reason) => report.invalid.push(InvalidGeometry {
                    layer: collection.layer.clone(),
                    feature: Some(feature_idx),
                    id: None,
                    reason,
                }),
            }
        }

        Ok(report)
    }
}

/// Public-space polygons; only their union matters.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicSpaceLayer {
    pub epsg: u32,
    pub shapes: Vec<MultiPolygon<f64>>,
}

impl PublicSpaceLayer {
    pub fn new(epsg: u32) -> Self {
        Self { epsg, shapes: Vec::new() }
    }

    pub fn extend(&mut self, collection: &FeatureCollection) -> AttributionResult<IngestReport> {
        let projector = projector_for(collection, self.epsg)?;
        let mut report = IngestReport::default();

        for (feature_idx, feature) in collection.features.iter().enumerate() {
            let Some(shape) = feature.geometry.as_ref().and_then(polygonal) else {
                report.skipped += 1;
                continue;
            };
            match projector.project(&shape) {
                Ok(shape) => {
                    report.accepted += 1;
                    self.shapes.push(shape);
                }
                Err(e) => report.invalid.push(InvalidGeometry {
                    layer: collection.layer.clone(),
                    feature: Some(feature_idx),
                    id: None,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }
}

/// A point feature with its classification label (culture subcategory, school type).
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub label: Option<String>,
    pub geometry: Point<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointLayer {
    pub epsg: u32,
    pub points: Vec<PointFeature>,
}

impl PointLayer {
    pub fn new(epsg: u32) -> Self {
        Self { epsg, points: Vec::new() }
    }

    /// Append the features of a collection, reading labels from `label_field`.
    /// Non-point geometries are reduced to their centroid; features without geometry are skipped.
    pub fn extend(&mut self, collection: &FeatureCollection, label_field: &str) -> AttributionResult<IngestReport> {
        let projector = projector_for(collection, self.epsg)?;
        let mut report = IngestReport::default();

        for (feature_idx, feature) in collection.features.iter().enumerate() {
            let Some(point) = feature.geometry.as_ref().and_then(representative_point) else {
                report.skipped += 1;
                continue;
            };

            let projected = projector.project(&point)
                .map_err(|e| e.to_string())
                .and_then(|p| if p.x().is_finite() && p.y().is_finite() {
                    Ok(p)
                } else {
                    Err("non-finite coordinate".to_string())
                });

            match projected {
                Ok(geometry) => {
                    report.accepted += 1;
                    self.points.push(PointFeature {
                        label: property_text(&feature.properties, label_field),
                        geometry,
                    });
                }
                Err(reason) => report.invalid.push(InvalidGeometry {
                    layer: collection.layer.clone(),
                    feature: Some(feature_idx),
                    id: None,
                    reason,
                }),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, Geometry, LineString};

    use super::*;
    use crate::error::AttributionError;
    use crate::source::Feature;

    fn square(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![(x: x, y: y), (x: x + 1.0, y: y), (x: x + 1.0, y: y + 1.0), (x: x, y: y)])
    }

    #[test]
    fn surface_ids_continue_across_collections() {
        let first = FeatureCollection::new("a", None, vec![
            Feature::new(square(0.0, 0.0)).with("bs_art_txt", "Gebaeude.Gebaeude"),
            Feature::new(square(2.0, 0.0)).with("bs_art_txt", "humusiert.Gartenanlage"),
        ]);
        let second = FeatureCollection::new("b", Some(2056), vec![
            Feature::new(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])).with("bs_art_txt", "Gebaeude.Gebaeude"),
            Feature::default(),
        ]);

        let mut layer = SurfaceLayer::new(2056);
        let report = layer.extend(&first, "bs_art_txt").unwrap();
        assert_eq!(report.accepted, 2);
        let report = layer.extend(&second, "bs_art_txt").unwrap();
        assert_eq!(report.invalid.len(), 2);
        assert_eq!(report.invalid[0].id, Some(3));

        assert_eq!(layer.polygons.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(layer.get(3).unwrap().geometry.is_none());
        assert_eq!(layer.get(4).unwrap().base_code, None);
        assert_eq!(layer.get(0), None);
        assert_eq!(layer.subset("Gebaeude.Gebaeude").map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn ids_stop_at_the_end_of_u32() {
        assert_eq!(next_id(0), Some(1));
        assert_eq!(next_id(u32::MAX as usize - 1), Some(u32::MAX));
        assert_eq!(next_id(u32::MAX as usize), None);
    }

    #[test]
    fn unsupported_crs_rejects_collection() {
        let fc = FeatureCollection::new("a", Some(31467), vec![Feature::new(square(0.0, 0.0))]);
        let mut layer = SurfaceLayer::new(2056);
        assert_eq!(layer.extend(&fc, "bs_art_txt"), Err(AttributionError::UnsupportedCrs(31467)));
        assert!(layer.is_empty());
    }

    #[test]
    fn categories_need_an_id() {
        let fc = FeatureCollection::new("gk", None, vec![
            Feature::new(square(0.0, 0.0)).with("gebaeudekategorieid", 1021.0),
            Feature::new(square(0.0, 0.0)),
        ]);
        let mut layer = CategoryLayer::new(2056);
        let report = layer.extend(&fc, "gebaeudekategorieid").unwrap();
        assert_eq!((report.accepted, report.skipped), (1, 1));
        assert_eq!(layer.polygons[0].category_id, "1021");
    }

    #[test]
    fn points_keep_null_labels_and_use_centroids() {
        let fc = FeatureCollection::new("sc", None, vec![
            Feature::new(square(0.0, 0.0)).with("sc_schultyp", "Primarschule"),
            Feature::new(Point::new(5.0, 5.0)),
        ]);
        let mut layer = PointLayer::new(2056);
        layer.extend(&fc, "sc_schultyp").unwrap();
        assert_eq!(layer.points.len(), 2);
        assert_eq!(layer.points[0].label.as_deref(), Some("Primarschule"));
        assert!((layer.points[0].geometry.x() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(layer.points[1].label, None);
    }
}
