//! Persisted artifacts of a run: the labelled GeoJSON layer, the QA table and the run statistics.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use geo::Geometry;
use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::attribution::{FinalLabelRecord, RunStats};
use crate::error::AttributionResult;
use crate::geom::Projector;
use crate::io::csv::{write_csv, write_csv_string};
use crate::io::geojson::write_feature_collection_bytes;
use crate::source::{Feature, FeatureCollection};

/// Attribute names of the persisted records.
pub mod fields {
    pub const ID: &str = "laufnr";
    pub const BASE_CODE: &str = "bs_art_txt";
    pub const LABEL: &str = "nutzung";
    pub const LABEL_SOURCE: &str = "label_source";
    pub const CATEGORY_ID: &str = "gebaeudekategorieid";
    pub const PUBLIC_PCT: &str = "oeffentlicher_raum_pct";
    pub const IS_PUBLIC: &str = "is_public";
    pub const CULTURE_LABEL: &str = "kultur_subkat";
    pub const CULTURE_DISTANCE: &str = "kultur_dist_m";
    pub const SCHOOL_LABEL: &str = "schultyp";
    pub const SCHOOL_DISTANCE: &str = "schule_dist_m";
}

fn record_properties(record: &FinalLabelRecord) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut put = |key: &str, value: Value| { properties.insert(key.to_string(), value); };

    put(fields::ID, record.id.into());
    put(fields::BASE_CODE, record.base_code.clone().into());
    put(fields::LABEL, record.nutzung.clone().into());
    put(fields::LABEL_SOURCE, record.provenance.as_str().into());
    put(fields::CATEGORY_ID, record.category_id.clone().into());
    put(fields::PUBLIC_PCT, record.public_pct.into());
    put(fields::IS_PUBLIC, record.is_public.into());
    put(fields::CULTURE_LABEL, record.culture_label.clone().into());
    put(fields::CULTURE_DISTANCE, record.culture_distance.into());
    put(fields::SCHOOL_LABEL, record.school_label.clone().into());
    put(fields::SCHOOL_DISTANCE, record.school_distance.into());
    properties
}

/// Convert records into a feature collection in `output_epsg`, one feature per record.
/// A geometry that fails to project is written as null rather than dropping its record.
pub fn records_to_collection(
    records: &[FinalLabelRecord],
    metric_epsg: u32,
    output_epsg: u32,
) -> AttributionResult<FeatureCollection> {
    let projector = Projector::new(metric_epsg, output_epsg)?;

    let features = records.iter()
        .map(|record| {
            let geometry = record.geometry.as_ref().and_then(|shape| match projector.project(shape) {
                Ok(projected) => Some(Geometry::MultiPolygon(projected)),
                Err(e) => {
                    warn!("[output] record {}: {e}", record.id);
                    None
                }
            });
            Feature { properties: record_properties(record), geometry }
        })
        .collect();

    Ok(FeatureCollection::new("landuse", Some(output_epsg), features))
}

/// Tabulate the records without geometry.
pub fn records_to_dataframe(records: &[FinalLabelRecord]) -> Result<DataFrame> {
    Ok(df![
        fields::ID => records.iter().map(|r| r.id).collect::<Vec<_>>(),
        fields::BASE_CODE => records.iter().map(|r| r.base_code.clone()).collect::<Vec<_>>(),
        fields::LABEL => records.iter().map(|r| r.nutzung.clone()).collect::<Vec<_>>(),
        fields::LABEL_SOURCE => records.iter().map(|r| r.provenance.as_str()).collect::<Vec<_>>(),
        fields::CATEGORY_ID => records.iter().map(|r| r.category_id.clone()).collect::<Vec<_>>(),
        fields::PUBLIC_PCT => records.iter().map(|r| r.public_pct).collect::<Vec<_>>(),
        fields::IS_PUBLIC => records.iter().map(|r| r.is_public).collect::<Vec<_>>(),
        fields::CULTURE_LABEL => records.iter().map(|r| r.culture_label.clone()).collect::<Vec<_>>(),
        fields::CULTURE_DISTANCE => records.iter().map(|r| r.culture_distance).collect::<Vec<_>>(),
        fields::SCHOOL_LABEL => records.iter().map(|r| r.school_label.clone()).collect::<Vec<_>>(),
        fields::SCHOOL_DISTANCE => records.iter().map(|r| r.school_distance).collect::<Vec<_>>(),
    ]?)
}

/// Write the labelled layer as GeoJSON.
pub fn write_geojson(records: &[FinalLabelRecord], metric_epsg: u32, output_epsg: u32, path: &Path) -> Result<()> {
    let collection = records_to_collection(records, metric_epsg, output_epsg)?;
    let bytes = write_feature_collection_bytes(&collection)?;
    fs::write(path, bytes)
        .with_context(|| format!("[output] Failed to write {}", path.display()))?;
    info!("[output] wrote {} features to {}", records.len(), path.display());
    Ok(())
}

/// Write the QA table as CSV.
pub fn write_qa_table(records: &[FinalLabelRecord], path: &Path) -> Result<()> {
    write_csv(&mut records_to_dataframe(records)?, path)
}

/// Render the QA table as a CSV string.
pub fn qa_table_string(records: &[FinalLabelRecord]) -> Result<String> {
    write_csv_string(&mut records_to_dataframe(records)?)
}

/// Write the run statistics as pretty-printed JSON.
pub fn write_stats(stats: &RunStats, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)
        .context("[output] Failed to serialize run statistics")?;
    fs::write(path, json)
        .with_context(|| format!("[output] Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::attribution::LabelSource;
    use crate::io::geojson::read_feature_collection;

    fn record() -> FinalLabelRecord {
        FinalLabelRecord {
            id: 1,
            base_code: Some("Gebaeude.Gebaeude".into()),
            nutzung: Some("Gebäude - Kino".into()),
            provenance: LabelSource::Culture,
            category_id: Some("1060".into()),
            culture_label: Some("Kino".into()),
            culture_distance: Some(0.0),
            // A 10 m square in Basel (LV95).
            geometry: Some(MultiPolygon::new(vec![polygon![
                (x: 2_611_000.0, y: 1_267_000.0), (x: 2_611_010.0, y: 1_267_000.0),
                (x: 2_611_010.0, y: 1_267_010.0), (x: 2_611_000.0, y: 1_267_010.0),
                (x: 2_611_000.0, y: 1_267_000.0),
            ]])),
            ..Default::default()
        }
    }

    #[test]
    fn collection_is_wgs84_with_qa_properties() {
        let collection = records_to_collection(&[record()], 2056, 4326).unwrap();
        let feature = &collection.features[0];
        assert_eq!(feature.properties[fields::ID], 1);
        assert_eq!(feature.properties[fields::LABEL], "Gebäude - Kino");
        assert_eq!(feature.properties[fields::LABEL_SOURCE], "culture");
        assert_eq!(feature.properties[fields::SCHOOL_LABEL], Value::Null);

        let Some(Geometry::MultiPolygon(shape)) = &feature.geometry else { panic!("expected a multipolygon") };
        let c = shape.0[0].exterior().0[0];
        assert!((7.5..7.7).contains(&c.x) && (47.5..47.6).contains(&c.y), "{c:?}");
    }

    #[test]
    fn geojson_and_table_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landuse.geojson");
        write_geojson(&[record()], 2056, 4326, &path).unwrap();

        let collection = read_feature_collection(&fs::read(&path).unwrap(), "landuse").unwrap();
        assert_eq!(collection.crs, None);
        assert_eq!(collection.features.len(), 1);

        let csv = qa_table_string(&[record(), FinalLabelRecord { id: 2, ..Default::default() }]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("laufnr,bs_art_txt,nutzung,label_source"));
        assert!(lines.next().unwrap().starts_with("1,Gebaeude.Gebaeude,Gebäude - Kino,culture,1060"));
        assert!(lines.next().unwrap().starts_with("2,,,unlabeled"));
    }
}
