use tracing::{debug, info, warn};

use crate::attribution::stats::{IngestStats, RunStats};
use crate::attribution::{
    assign_nearest, classify_public_space, fuse_labels, resolve_categories,
    FinalLabelRecord, FusionInputs, FusionStats, NearestMapping,
};
use crate::config::{PipelineConfig, PointLayerSpec};
use crate::error::{AttributionError, AttributionResult};
use crate::source::{FeatureCollection, FeatureSource, Fetched};
use crate::store::{
    CategoryLayer, IngestReport, InvalidGeometry, PointLayer, PublicSpaceLayer, SurfaceLayer,
};

/// The five source layers of a run, projected into the metric CRS.
/// A `None` layer was unavailable and its stage is skipped.
#[derive(Debug, Clone)]
pub struct Layers {
    pub surfaces: SurfaceLayer,
    pub categories: Option<CategoryLayer>,
    pub public_space: Option<PublicSpaceLayer>,
    pub culture: Option<PointLayer>,
    pub schools: Option<PointLayer>,
    /// Layers that could not be fetched or ingested.
    pub unavailable: Vec<String>,
    pub invalid: Vec<InvalidGeometry>,
    pub skipped_features: usize,
}

/// Output of a run: one record per surface polygon plus everything observed on the way.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<FinalLabelRecord>,
    pub stats: RunStats,
}

impl Layers {
    /// Layers holding only the base land cover.
    pub fn new(surfaces: SurfaceLayer) -> Self {
        Self {
            surfaces,
            categories: None,
            public_space: None,
            culture: None,
            schools: None,
            unavailable: Vec::new(),
            invalid: Vec::new(),
            skipped_features: 0,
        }
    }

    /// Fetch and ingest every configured layer.
    ///
    /// Fails only when no base land-cover layer could be read; any other missing layer just
    /// leaves its slot empty.
    pub fn fetch(source: &dyn FeatureSource, config: &PipelineConfig) -> AttributionResult<Self> {
        let epsg = config.metric_epsg;
        let names = &config.layers;
        let mut layers = Self::new(SurfaceLayer::new(epsg));

        let mut surfaces = SurfaceLayer::new(epsg);
        let fetched = source.fetch_all(&names.base);
        if layers.ingest(fetched, |c| surfaces.extend(c, &names.base_code_field)) == 0 {
            return Err(AttributionError::SourceUnavailable {
                layer: names.base.join(", "),
                reason: "no base land-cover layer could be read".to_string(),
            });
        }
        layers.surfaces = surfaces;

        let mut categories = CategoryLayer::new(epsg);
        let fetched = source.fetch_all(&names.categories);
        if layers.ingest(fetched, |c| categories.extend(c, &names.category_id_field)) > 0 {
            layers.categories = Some(categories);
        }

        let mut public_space = PublicSpaceLayer::new(epsg);
        let fetched = source.fetch_all(&names.public_space);
        if layers.ingest(fetched, |c| public_space.extend(c)) > 0 {
            layers.public_space = Some(public_space);
        }

        layers.culture = layers.ingest_points(source, &names.culture, epsg);
        layers.schools = layers.ingest_points(source, &names.schools, epsg);

        info!(
            "[pipeline] ingested {} surface polygons ({} layers unavailable, {} invalid geometries)",
            layers.surfaces.len(), layers.unavailable.len(), layers.invalid.len(),
        );

        Ok(layers)
    }

    /// Point layers are ingested one by one since each names its own label attribute.
    fn ingest_points(&mut self, source: &dyn FeatureSource, specs: &[PointLayerSpec], epsg: u32) -> Option<PointLayer> {
        let names = specs.iter().map(|spec| spec.name.clone()).collect::<Vec<_>>();
        let fetched = source.fetch_all(&names);

        let mut points = PointLayer::new(epsg);
        let ingested = self.ingest(fetched, |c| {
            let label_field = specs.iter()
                .find(|spec| spec.name == c.layer)
                .map(|spec| spec.label_field.as_str())
                .unwrap_or_default();
            points.extend(c, label_field)
        });

        (ingested > 0).then_some(points)
    }

    /// Feed fetched collections into a layer, recording failures.
    /// Returns the number of collections ingested.
    fn ingest(
        &mut self,
        fetched: Fetched,
        mut extend: impl FnMut(&FeatureCollection) -> AttributionResult<IngestReport>,
    ) -> usize {
        self.unavailable.extend(fetched.unavailable);

        let mut ingested = 0;
        for collection in &fetched.collections {
            match extend(collection) {
                Ok(report) => {
                    debug!(
                        "[pipeline] {}: {} accepted, {} skipped, {} invalid",
                        collection.layer, report.accepted, report.skipped, report.invalid.len(),
                    );
                    if !report.invalid.is_empty() {
                        warn!("[pipeline] {}: {} features with unusable geometry", collection.layer, report.invalid.len());
                    }
                    self.skipped_features += report.skipped;
                    self.invalid.extend(report.invalid);
                    ingested += 1;
                }
                Err(e) => {
                    warn!("[pipeline] {}: {e}", collection.layer);
                    self.unavailable.push(collection.layer.clone());
                }
            }
        }
        ingested
    }
}

/// Run the whole pipeline: validate the configuration, fetch and ingest the layers, attribute.
pub fn run(source: &dyn FeatureSource, config: &PipelineConfig) -> AttributionResult<PipelineOutput> {
    config.validate()?;
    let layers = Layers::fetch(source, config)?;
    Ok(attribute(&layers, config))
}

/// Attribute already ingested layers. Stages whose layer is missing are skipped and fusion
/// proceeds without their relation.
pub fn attribute(layers: &Layers, config: &PipelineConfig) -> PipelineOutput {
    let mut stats = RunStats {
        unavailable_layers: layers.unavailable.clone(),
        invalid_geometries: layers.invalid.clone(),
        ..Default::default()
    };

    let surfaces = &layers.surfaces;
    let buildings = surfaces.subset(&config.building_code).collect::<Vec<_>>();
    let targets = surfaces.subset(&config.paved_code)
        .filter(|p| p.geometry.is_some())
        .collect::<Vec<_>>();

    stats.ingest = IngestStats {
        surface_polygons: surfaces.len(),
        buildings: buildings.len(),
        paved_targets: targets.len(),
        category_polygons: layers.categories.as_ref().map_or(0, |l| l.polygons.len()),
        public_polygons: layers.public_space.as_ref().map_or(0, |l| l.shapes.len()),
        culture_points: layers.culture.as_ref().map_or(0, |l| l.points.len()),
        school_points: layers.schools.as_ref().map_or(0, |l| l.points.len()),
        skipped_features: layers.skipped_features,
    };

    let mut skip = |stage: &str| {
        warn!("[pipeline] skipping {stage}: no layer available");
        stats.skipped_stages.push(stage.to_string());
    };

    let categories = match &layers.categories {
        Some(categories) => Some(resolve_categories(buildings.iter().copied(), categories)),
        None => { skip("category"); None }
    };

    let coverage = match &layers.public_space {
        Some(public) => Some(classify_public_space(targets.iter().copied(), &public.shapes, config.threshold_pct)),
        None => { skip("public_space"); None }
    };

    let culture = match &layers.culture {
        Some(points) => Some(assign_nearest(&points.points, buildings.iter().copied(), config.culture_max_distance)),
        None => { skip("culture"); None }
    };

    let school = match &layers.schools {
        Some(points) => Some(assign_nearest(&points.points, buildings.iter().copied(), config.school_max_distance)),
        None => { skip("school"); None }
    };

    let empty = NearestMapping::new();
    let records = fuse_labels(FusionInputs {
        surfaces,
        categories: categories.as_ref().map(|r| r.assignments.as_slice()).unwrap_or_default(),
        coverage: coverage.as_ref().map(|r| r.records.as_slice()).unwrap_or_default(),
        culture: culture.as_ref().map_or(&empty, |r| &r.filtered),
        school: school.as_ref().map_or(&empty, |r| &r.filtered),
    }, config);

    if let Some(coverage) = &coverage {
        stats.invalid_geometries.extend(coverage.invalid.iter().filter_map(|e| match e {
            AttributionError::GeometryInvalid { id, reason } => Some(InvalidGeometry {
                layer: "coverage".to_string(),
                feature: None,
                id: Some(*id),
                reason: reason.clone(),
            }),
            _ => None,
        }));
    }

    stats.category = categories.map(|r| r.stats);
    stats.coverage = coverage.map(|r| r.stats);
    stats.culture = culture.map(|r| r.stats);
    stats.school = school.map(|r| r.stats);
    stats.fusion = FusionStats::tally(&records);

    PipelineOutput { records, stats }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon, Point};

    use super::*;
    use crate::source::{Feature, MemorySource};
    use crate::store::PointFeature;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]])
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.layers.base = vec!["base".into()];
        config.layers.categories = vec!["categories".into()];
        config.layers.public_space = vec!["public".into()];
        config.layers.culture = vec![PointLayerSpec::new("culture", "bi_subkategorie")];
        config.layers.schools = vec![PointLayerSpec::new("sc", "sc_schultyp"), PointLayerSpec::new("so", "so_schultyp")];
        config
    }

    #[test]
    fn missing_base_layer_aborts() {
        let err = run(&MemorySource::new(), &config()).unwrap_err();
        assert!(matches!(err, AttributionError::SourceUnavailable { .. }));
    }

    #[test]
    fn invalid_configuration_aborts_before_fetching() {
        let config = PipelineConfig { categories: Default::default(), ..config() };
        let err = run(&MemorySource::new(), &config).unwrap_err();
        assert!(matches!(err, AttributionError::ConfigurationMissing(_)));
    }

    #[test]
    fn missing_optional_layers_skip_their_stage() {
        let source = MemorySource::new().with(FeatureCollection::new("base", Some(2056), vec![
            Feature::new(rect(0.0, 0.0, 10.0, 10.0).0[0].clone()).with("bs_art_txt", "Gebaeude.Gebaeude"),
        ]));

        let output = run(&source, &config()).unwrap();
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].nutzung.as_deref(), Some("Gebaeude - Gebaeude"));
        assert_eq!(output.stats.skipped_stages, vec!["category", "public_space", "culture", "school"]);
        assert_eq!(output.stats.unavailable_layers.len(), 5);
        assert!(output.stats.category.is_none());
    }

    #[test]
    fn school_layers_read_their_own_label_field() {
        let source = MemorySource::new()
            .with(FeatureCollection::new("base", None, vec![
                Feature::new(rect(0.0, 0.0, 10.0, 10.0).0[0].clone()).with("bs_art_txt", "Gebaeude.Gebaeude"),
                Feature::new(rect(20.0, 0.0, 30.0, 10.0).0[0].clone()).with("bs_art_txt", "Gebaeude.Gebaeude"),
            ]))
            .with(FeatureCollection::new("sc", None, vec![Feature::new(Point::new(5.0, 5.0)).with("sc_schultyp", "Primarschule")]))
            .with(FeatureCollection::new("so", None, vec![Feature::new(Point::new(25.0, 5.0)).with("so_schultyp", "Kindergarten")]));

        let output = run(&source, &config()).unwrap();
        let labels = output.records.iter().map(|r| r.nutzung.clone().unwrap()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Gebäude - Primarschule", "Gebäude - Kindergarten"]);
        assert_eq!(output.stats.ingest.school_points, 2);
    }

    #[test]
    fn attribute_runs_on_prebuilt_layers() {
        let surfaces = SurfaceLayer::from_rows(2056, vec![
            (Some("Gebaeude.Gebaeude".into()), Some(rect(0.0, 0.0, 10.0, 10.0))),
            (Some("befestigt.uebrige_befestigte.uebrige_befestigte".into()), None),
        ]);
        let mut layers = Layers::new(surfaces);
        layers.culture = Some(PointLayer {
            epsg: 2056,
            points: vec![PointFeature { label: Some("Kino".into()), geometry: Point::new(12.0, 5.0) }],
        });

        let output = attribute(&layers, &config());
        assert_eq!(output.records[0].nutzung.as_deref(), Some("Gebäude - Kino"));
        assert_eq!(output.records[1].nutzung.as_deref(), Some("befestigt - uebrige befestigte - uebrige befestigte"));
        assert_eq!(output.stats.ingest.paved_targets, 0);
        assert_eq!(output.stats.culture.as_ref().unwrap().buildings_within_cutoff, 1);
    }
}
