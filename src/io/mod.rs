//! IO module for format-specific reading and writing operations.
//!
//! # Format Modules
//!
//! - `geojson` - GeoJSON feature collections for source layers and the labelled output
//! - `csv` - CSV format for the tabular QA export

pub(crate) mod csv;
pub(crate) mod geojson;
