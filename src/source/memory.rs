use ahash::AHashMap;

use crate::error::AttributionError;
use crate::source::{FeatureCollection, FeatureSource};

/// In-memory layers, for fixtures and callers that already hold their data.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    layers: AHashMap<String, FeatureCollection>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    /// Add (or replace) a layer under its own name.
    pub fn insert(&mut self, collection: FeatureCollection) {
        self.layers.insert(collection.layer.clone(), collection);
    }

    /// Builder-style [`MemorySource::insert`].
    pub fn with(mut self, collection: FeatureCollection) -> Self {
        self.insert(collection);
        self
    }
}

impl FeatureSource for MemorySource {
    fn fetch(&self, layer: &str) -> Result<FeatureCollection, AttributionError> {
        self.layers.get(layer).cloned().ok_or_else(|| AttributionError::SourceUnavailable {
            layer: layer.to_string(),
            reason: "layer not present".to_string(),
        })
    }
}
