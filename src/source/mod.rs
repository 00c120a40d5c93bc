//! Feature-source capability: how the pipeline obtains its source layers.
//!
//! Retrieval (network services, retries, format negotiation) lives behind [`FeatureSource`];
//! the pipeline only sees materialized [`FeatureCollection`]s and the names of layers that
//! could not be retrieved.

mod dir;
mod memory;

use geo::Geometry;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AttributionError;

pub use dir::GeoJsonDirSource;
pub use memory::MemorySource;

/// A single source feature: free-form attributes plus an optional geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    pub properties: Map<String, Value>,
    pub geometry: Option<Geometry<f64>>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self { properties: Map::new(), geometry: Some(geometry.into()) }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// All features of one named layer, with the CRS the layer declares (EPSG code), if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub layer: String,
    pub crs: Option<u32>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(layer: &str, crs: Option<u32>, features: Vec<Feature>) -> Self {
        Self { layer: layer.to_string(), crs, features }
    }
}

/// Result of fetching a group of layers: what arrived, and what did not.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub collections: Vec<FeatureCollection>,
    pub unavailable: Vec<String>,
}

/// Capability: fetch all features of a named layer.
pub trait FeatureSource {
    /// Fetch one layer, failing with [`AttributionError::SourceUnavailable`].
    fn fetch(&self, layer: &str) -> Result<FeatureCollection, AttributionError>;

    /// Fetch several layers, keeping going past failures. Collections are named as requested.
    fn fetch_all(&self, layers: &[String]) -> Fetched {
        let mut fetched = Fetched::default();
        for layer in layers {
            match self.fetch(layer) {
                Ok(mut collection) => {
                    collection.layer.clone_from(layer);
                    fetched.collections.push(collection);
                }
                Err(e) => {
                    warn!("[source] {e}");
                    fetched.unavailable.push(layer.clone());
                }
            }
        }
        fetched
    }
}
