use serde::Serialize;

use crate::attribution::{CategoryStats, CoverageStats, NearestStats};
use crate::store::InvalidGeometry;

/// Minimum, median and maximum of a set of percentages; all zero for an empty set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PctSummary {
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl PctSummary {
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        if values.is_empty() { return Self::default() }

        values.sort_by(f64::total_cmp);
        let n = values.len();
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        };
        Self { min: values[0], median, max: values[n - 1] }
    }
}

/// Per-source counts of what was read into the geometry store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub surface_polygons: usize,
    pub buildings: usize,
    pub paved_targets: usize,
    pub category_polygons: usize,
    pub public_polygons: usize,
    pub culture_points: usize,
    pub school_points: usize,
    /// Features dropped for missing attributes or geometry.
    pub skipped_features: usize,
}

/// How many final records each fusion rule produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionStats {
    pub records: usize,
    pub baseline: usize,
    pub building_category: usize,
    pub public_space: usize,
    pub culture: usize,
    pub school: usize,
    pub unlabeled: usize,
}

/// Everything observable about one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub ingest: IngestStats,
    /// `None` when the stage was skipped.
    pub category: Option<CategoryStats>,
    pub coverage: Option<CoverageStats>,
    pub culture: Option<NearestStats>,
    pub school: Option<NearestStats>,
    pub fusion: FusionStats,
    /// Layers the feature source could not deliver.
    pub unavailable_layers: Vec<String>,
    /// Stages skipped because none of their layers were available.
    pub skipped_stages: Vec<String>,
    pub invalid_geometries: Vec<InvalidGeometry>,
}
