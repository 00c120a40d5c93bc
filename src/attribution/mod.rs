//! The attribution core: category overlay, public-space coverage, nearest-feature assignment
//! and label fusion, plus the pipeline that wires them together.

mod category;
mod coverage;
mod fusion;
mod nearest;
mod pipeline;
mod stats;

pub use category::{resolve_categories, CategoryAssignment, CategoryResolution, CategoryStats};
pub use coverage::{classify, classify_public_space, CoverageRecord, CoverageResult, CoverageStats};
pub use fusion::{fuse_labels, FinalLabelRecord, FusionInputs, LabelSource};
pub use nearest::{assign_nearest, NearestMapping, NearestMatch, NearestResult, NearestStats};
pub use pipeline::{attribute, run, Layers, PipelineOutput};
pub use stats::{FusionStats, IngestStats, PctSummary, RunStats};
