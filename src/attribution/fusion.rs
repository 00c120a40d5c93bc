use ahash::AHashMap;
use geo::MultiPolygon;
use serde::Serialize;
use tracing::info;

use crate::attribution::stats::FusionStats;
use crate::attribution::{CategoryAssignment, CoverageRecord, NearestMapping};
use crate::config::PipelineConfig;
use crate::store::SurfaceLayer;

/// The rule that produced a record's final label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// No rule applied: the polygon has no base code.
    #[default]
    Unlabeled,
    Baseline,
    BuildingCategory,
    PublicSpace,
    Culture,
    School,
}

impl LabelSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelSource::Unlabeled => "unlabeled",
            LabelSource::Baseline => "baseline",
            LabelSource::BuildingCategory => "building_category",
            LabelSource::PublicSpace => "public_space",
            LabelSource::Culture => "culture",
            LabelSource::School => "school",
        }
    }
}

/// The terminal row of a run: one per surface polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalLabelRecord {
    pub id: u32,
    pub base_code: Option<String>,
    pub nutzung: Option<String>,
    pub provenance: LabelSource,
    pub category_id: Option<String>,
    pub public_pct: Option<f64>,
    pub is_public: Option<bool>,
    pub culture_label: Option<String>,
    pub culture_distance: Option<f64>,
    pub school_label: Option<String>,
    pub school_distance: Option<f64>,
    pub geometry: Option<MultiPolygon<f64>>,
}

/// The derived relations fusion joins onto the surface layer. Empty relations stand in for
/// skipped stages.
#[derive(Debug, Clone, Copy)]
pub struct FusionInputs<'a> {
    pub surfaces: &'a SurfaceLayer,
    pub categories: &'a [CategoryAssignment],
    pub coverage: &'a [CoverageRecord],
    /// Distance-filtered culture matches.
    pub culture: &'a NearestMapping,
    /// Distance-filtered school matches.
    pub school: &'a NearestMapping,
}

/// A fusion rule: the label it assigns to a record, if its condition holds.
type Rule = fn(&PipelineConfig, &FinalLabelRecord) -> Option<String>;

/// Rules in ascending precedence; a later rule overrides an earlier one.
const RULES: [(LabelSource, Rule); 5] = [
    (LabelSource::Baseline, baseline),
    (LabelSource::BuildingCategory, building_category),
    (LabelSource::PublicSpace, public_space),
    (LabelSource::Culture, culture),
    (LabelSource::School, school),
];

/// `Gebaeude.Gebaeude` -> `Gebaeude - Gebaeude`, `uebrige_befestigte` -> `uebrige befestigte`.
fn baseline(config: &PipelineConfig, record: &FinalLabelRecord) -> Option<String> {
    let code = record.base_code.as_ref()?;
    Some(code.replace('.', &config.labels.separator).replace('_', " "))
}

fn building_category(config: &PipelineConfig, record: &FinalLabelRecord) -> Option<String> {
    let code = record.category_id.as_ref()?;
    let text = config.categories.get(code).unwrap_or(code);
    Some(format!("{}{}{text}", config.labels.building, config.labels.separator))
}

fn public_space(config: &PipelineConfig, record: &FinalLabelRecord) -> Option<String> {
    if record.base_code.as_deref() != Some(config.paved_code.as_str()) || record.category_id.is_some() {
        return None;
    }
    let phrase = if record.is_public? { &config.labels.public } else { &config.labels.non_public };
    Some(format!("{}{}{phrase}", config.labels.paved, config.labels.separator))
}

fn is_building(config: &PipelineConfig, record: &FinalLabelRecord) -> bool {
    record.base_code.as_deref() == Some(config.building_code.as_str()) && record.geometry.is_some()
}

fn culture(config: &PipelineConfig, record: &FinalLabelRecord) -> Option<String> {
    if !is_building(config, record) { return None }
    let label = record.culture_label.as_ref()?;
    Some(format!("{}{}{label}", config.labels.building, config.labels.separator))
}

fn school(config: &PipelineConfig, record: &FinalLabelRecord) -> Option<String> {
    if !is_building(config, record) { return None }
    let label = record.school_label.as_ref()?;
    Some(format!("{}{}{label}", config.labels.building, config.labels.separator))
}

/// Produce exactly one labelled record per surface polygon, in id order.
///
/// Each record first collects the matches of every stage (these also serve as QA fields),
/// then the rules are folded over it in precedence order.
pub fn fuse_labels(inputs: FusionInputs<'_>, config: &PipelineConfig) -> Vec<FinalLabelRecord> {
    let categories = inputs.categories.iter()
        .map(|a| (a.id, a))
        .collect::<AHashMap<_, _>>();
    let coverage = inputs.coverage.iter()
        .map(|r| (r.id, r))
        .collect::<AHashMap<_, _>>();

    let records = inputs.surfaces.polygons.iter()
        .map(|surface| {
            let coverage = coverage.get(&surface.id);
            let culture = inputs.culture.get(&surface.id);
            let school = inputs.school.get(&surface.id);

            let record = FinalLabelRecord {
                id: surface.id,
                base_code: surface.base_code.clone(),
                category_id: categories.get(&surface.id).map(|a| a.category_id.clone()),
                public_pct: coverage.map(|r| r.pct),
                is_public: coverage.map(|r| r.is_public),
                culture_label: culture.map(|m| m.label.clone()),
                culture_distance: culture.map(|m| m.distance),
                school_label: school.map(|m| m.label.clone()),
                school_distance: school.map(|m| m.distance),
                geometry: surface.geometry.clone(),
                ..Default::default()
            };

            RULES.iter().fold(record, |mut record, (source, rule)| {
                if let Some(label) = rule(config, &record) {
                    record.nutzung = Some(label);
                    record.provenance = *source;
                }
                record
            })
        })
        .collect::<Vec<_>>();

    let stats = FusionStats::tally(&records);
    info!(
        "[fusion] {} records: {} category, {} public space, {} culture, {} school, {} baseline, {} unlabeled",
        stats.records, stats.building_category, stats.public_space, stats.culture, stats.school,
        stats.baseline, stats.unlabeled,
    );

    records
}

impl FusionStats {
    /// Count the records by the rule that labelled them.
    pub fn tally(records: &[FinalLabelRecord]) -> Self {
        let mut stats = Self { records: records.len(), ..Default::default() };
        for record in records {
            match record.provenance {
                LabelSource::Unlabeled => stats.unlabeled += 1,
                LabelSource::Baseline => stats.baseline += 1,
                LabelSource::BuildingCategory => stats.building_category += 1,
                LabelSource::PublicSpace => stats.public_space += 1,
                LabelSource::Culture => stats.culture += 1,
                LabelSource::School => stats.school += 1,
            }
        }
        stats
    }
}
