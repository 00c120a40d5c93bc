use thiserror::Error;

/// Failures raised by the attribution core.
///
/// Per-geometry failures (`GeometryInvalid`) are collected into the run
/// statistics and never abort a run; the other variants abort the stage (or
/// the run) they occur in.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttributionError {
    #[error("layer '{layer}' could not be retrieved: {reason}")]
    SourceUnavailable { layer: String, reason: String },

    #[error("geometry of feature {id} is invalid: {reason}")]
    GeometryInvalid { id: u32, reason: String },

    #[error("configuration is missing or invalid: {0}")]
    ConfigurationMissing(String),

    #[error("unsupported CRS EPSG:{0}")]
    UnsupportedCrs(u32),

    #[error("failed to project from EPSG:{from} to EPSG:{to}: {reason}")]
    Projection { from: u32, to: u32, reason: String },
}

pub type AttributionResult<T> = std::result::Result<T, AttributionError>;
