//! Geometry store: the typed layers every pipeline stage reads.
//!
//! Layers are ingested from [`FeatureCollection`](crate::source::FeatureCollection)s and
//! brought into one planar CRS on the way in (assigned when a collection declares none,
//! transformed otherwise).

mod convert;
mod layers;

pub use layers::{
    CategoryLayer, CategoryPolygon, IngestReport, InvalidGeometry, PointFeature, PointLayer,
    PublicSpaceLayer, SurfaceLayer, SurfacePolygon,
};
