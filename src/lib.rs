#![doc = "Land-use attribution public API"]
mod attribution;
mod config;
mod error;
mod geom;
mod io;
mod output;
mod source;
mod store;

#[doc(inline)]
pub use attribution::{
    assign_nearest, attribute, classify, classify_public_space, fuse_labels, resolve_categories, run,
    CategoryAssignment, CategoryResolution, CategoryStats, CoverageRecord, CoverageResult, CoverageStats,
    FinalLabelRecord, FusionInputs, FusionStats, IngestStats, LabelSource, Layers, NearestMapping,
    NearestMatch, NearestResult, NearestStats, PctSummary, PipelineOutput, RunStats,
};

#[doc(inline)]
pub use config::{LabelTexts, LayerConfig, PipelineConfig, PointLayerSpec};

#[doc(inline)]
pub use error::{AttributionError, AttributionResult};

#[doc(inline)]
pub use geom::{is_supported_epsg, Projector};

#[doc(inline)]
pub use output::{
    fields, qa_table_string, records_to_collection, records_to_dataframe, write_geojson, write_qa_table,
    write_stats,
};

#[doc(inline)]
pub use source::{Feature, FeatureCollection, FeatureSource, Fetched, GeoJsonDirSource, MemorySource};

#[doc(inline)]
pub use store::{
    CategoryLayer, CategoryPolygon, IngestReport, InvalidGeometry, PointFeature, PointLayer,
    PublicSpaceLayer, SurfaceLayer, SurfacePolygon,
};
