use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AttributionError;
use crate::geom::{dissolve, heal, ShapeIndex};
use crate::store::SurfacePolygon;

/// Public-space coverage of one target polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRecord {
    pub id: u32,
    pub covered_area: f64,
    pub total_area: f64,
    /// `covered_area / total_area * 100`, zero for polygons without area.
    pub pct: f64,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageStats {
    pub threshold_pct: f64,
    pub targets: usize,
    pub public: usize,
    pub non_public: usize,
    pub public_share_pct: f64,
    pub non_public_share_pct: f64,
    pub invalid_targets: usize,
    pub invalid_public: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageResult {
    /// One record per valid target, in input order.
    pub records: Vec<CoverageRecord>,
    /// `GeometryInvalid` for every target that could not be healed.
    pub invalid: Vec<AttributionError>,
    pub stats: CoverageStats,
}

/// Slack, in percentage points, for comparing overlay-derived percentages.
/// The overlay snaps to a grid, so clipped areas at LV95 magnitudes drift
/// by a few 1e-7 percentage points.
pub(crate) const PCT_TOLERANCE: f64 = 1e-5;

/// Binarize a coverage percentage; the threshold itself counts as public.
#[inline]
pub fn classify(pct: f64, threshold_pct: f64) -> bool {
    pct >= threshold_pct - PCT_TOLERANCE
}

/// Compute the share of every target polygon covered by the union of the public-space shapes.
///
/// Both inputs go through one healing pass first. Public shapes that cannot be healed are left
/// out of the union; targets that cannot be healed get no record. Every other target gets a
/// record, including those the public region never touches.
pub fn classify_public_space<'a>(
    targets: impl IntoIterator<Item = &'a SurfacePolygon>,
    public: &[MultiPolygon<f64>],
    threshold_pct: f64,
) -> CoverageResult {
    let mut result = CoverageResult::default();
    result.stats.threshold_pct = threshold_pct;

    let healed_public = public.iter()
        .enumerate()
        .filter_map(|(i, shape)| match heal(shape) {
            Ok(shape) => Some(shape),
            Err(reason) => {
                debug!("[coverage] dropping public shape {i}: {reason}");
                result.stats.invalid_public += 1;
                None
            }
        })
        .collect::<Vec<_>>();

    let region = dissolve(&healed_public);
    let parts = region.0.into_iter()
        .map(|polygon| MultiPolygon::new(vec![polygon]))
        .collect::<Vec<_>>();
    let index = ShapeIndex::new(&parts);
    debug!("[coverage] public region has {} parts", index.len());

    for target in targets {
        let healed = match target.geometry.as_ref().ok_or_else(|| "missing geometry".to_string()).and_then(heal) {
            Ok(shape) => shape,
            Err(reason) => {
                debug!("[coverage] skipping target {}: {reason}", target.id);
                result.invalid.push(AttributionError::GeometryInvalid { id: target.id, reason });
                continue;
            }
        };

        let total_area = healed.unsigned_area();
        let covered_area = match healed.bounding_rect() {
            Some(rect) => {
                let nearby = index.candidates(&rect).into_iter()
                    .flat_map(|j| parts[j].0.iter().cloned())
                    .collect::<Vec<_>>();
                if nearby.is_empty() {
                    0.0
                } else {
                    healed.intersection(&MultiPolygon::new(nearby)).unsigned_area()
                }
            }
            None => 0.0,
        };

        let pct = if total_area > 0.0 { covered_area / total_area * 100.0 } else { 0.0 };
        result.records.push(CoverageRecord {
            id: target.id,
            covered_area,
            total_area,
            pct,
            is_public: classify(pct, threshold_pct),
        });
    }

    let stats = &mut result.stats;
    stats.targets = result.records.len();
    stats.public = result.records.iter().filter(|r| r.is_public).count();
    stats.non_public = stats.targets - stats.public;
    if stats.targets > 0 {
        stats.public_share_pct = stats.public as f64 / stats.targets as f64 * 100.0;
        stats.non_public_share_pct = stats.non_public as f64 / stats.targets as f64 * 100.0;
    }
    stats.invalid_targets = result.invalid.len();

    info!(
        "[coverage] {} targets at {}%: {} public ({:.1}%), {} not public, {} invalid",
        stats.targets, threshold_pct, stats.public, stats.public_share_pct, stats.non_public, stats.invalid_targets,
    );

    result
}
