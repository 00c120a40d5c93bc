use std::{fs, path::PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::error::AttributionError;
use crate::io::geojson::read_feature_collection;
use crate::source::{FeatureCollection, FeatureSource};

/// Layers stored as `<dir>/<layer>.geojson`. Characters that are awkward in file names
/// (`:` as in `ms:BS_...`, `/`, `\`) are replaced by `_`.
#[derive(Debug, Clone)]
pub struct GeoJsonDirSource {
    dir: PathBuf,
}

impl GeoJsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File a layer is read from.
    pub fn layer_path(&self, layer: &str) -> PathBuf {
        let file_name = layer.replace([':', '/', '\\'], "_");
        self.dir.join(format!("{file_name}.geojson"))
    }
}

impl FeatureSource for GeoJsonDirSource {
    fn fetch(&self, layer: &str) -> Result<FeatureCollection, AttributionError> {
        let path = self.layer_path(layer);
        debug!("[source] reading {layer} from {}", path.display());

        fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|bytes| read_feature_collection(&bytes, layer))
            .map_err(|e| AttributionError::SourceUnavailable {
                layer: layer.to_string(),
                reason: format!("{e:#}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_names_are_sanitized() {
        let source = GeoJsonDirSource::new("/data");
        assert_eq!(
            source.layer_path("ms:BS_Bodenbedeckungen_Gebaeude_Gebaeude"),
            PathBuf::from("/data/ms_BS_Bodenbedeckungen_Gebaeude_Gebaeude.geojson"),
        );
    }

    #[test]
    fn reads_layer_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("points.geojson"),
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"label":"Kino"},"geometry":{"type":"Point","coordinates":[1,2]}}]}"#,
        ).unwrap();

        let source = GeoJsonDirSource::new(dir.path());
        let fc = source.fetch("points").unwrap();
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.crs, None);

        assert!(matches!(source.fetch("absent"), Err(AttributionError::SourceUnavailable { .. })));
    }
}
