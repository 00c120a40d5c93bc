use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{AttributionError, AttributionResult};
use crate::geom::is_supported_epsg;

/// A point layer and the attribute holding its classification label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLayerSpec {
    pub name: String,
    pub label_field: String,
}

impl PointLayerSpec {
    pub fn new(name: &str, label_field: &str) -> Self {
        Self { name: name.to_string(), label_field: label_field.to_string() }
    }
}

/// Names of the source layers and the attributes read from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Base land-cover layers, concatenated in this order before ids are assigned.
    pub base: Vec<String>,
    pub base_code_field: String,
    pub categories: Vec<String>,
    pub category_id_field: String,
    pub public_space: Vec<String>,
    pub culture: Vec<PointLayerSpec>,
    pub schools: Vec<PointLayerSpec>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        const BASE: &[&str] = &[
            "befestigt_Bahnareal", "befestigt_Fabrikareal", "befestigt_Gewaesservorland",
            "befestigt_Hafenareal", "befestigt_Sportanlage", "befestigt_StrasseWeg",
            "befestigt_Tramareal", "befestigt_Trottoir", "befestigt_Verkehrsinsel",
            "befestigt_Wasserbecken", "befestigt_uebrigeBefestigte",
            "bestockt_geschlossenerWald", "bestockt_uebrigeBestockte",
            "Gebaeude_Gebaeude", "Gebaeude_Tank",
            "Gewaesser_fliessendes", "Gewaesser_stehendes",
            "humusiert_AckerWieseWeide", "humusiert_Friedhof", "humusiert_Gartenanlage",
            "humusiert_ParkanlageSpielplatz", "humusiert_Schrebergarten",
            "humusiert_SportanlageHumusiert", "humusiert_Tierpark", "humusiert_Reben",
            "humusiert_Intensivkultur", "humusiert_Gewaesservorland", "humusiert_uebrigeHumusierte",
        ];
        const SC: &[&str] = &[
            "Tagesstruktur", "Turnhalle", "Sportplatz", "Schwimmhalle", "Kindergarten",
            "Primarschule", "Sekundarschule", "Gymnasium", "ZentrumBrueckenangebote",
            "Spezialangebot", "Gewerbeschule",
        ];
        const SO: &[&str] = &[
            "BezeichnungStandort_Tagesstruktur", "BezeichnungStandort_Kindergarten",
            "BezeichnungStandort_Primarschule", "Tagesstruktur", "Kindergarten", "Primarschule",
        ];

        let schools = SC.iter()
            .map(|name| PointLayerSpec::new(&format!("ms:SC_{name}"), "sc_schultyp"))
            .chain(SO.iter().map(|name| PointLayerSpec::new(&format!("ms:SO_{name}"), "so_schultyp")))
            .collect();

        Self {
            base: BASE.iter().map(|name| format!("ms:BS_Bodenbedeckungen_{name}")).collect(),
            base_code_field: "bs_art_txt".to_string(),
            categories: vec!["DM_Gebaeudeinformationen_DatenmarktGebaeudekategorie".to_string()],
            category_id_field: "gebaeudekategorieid".to_string(),
            public_space: vec![
                "OR_OeffentlicherRaum_Allmend".to_string(),
                "OR_OeffentlicherRaum_Noerg".to_string(),
            ],
            culture: vec![PointLayerSpec::new("BI_KulturUnterhaltung", "bi_subkategorie")],
            schools,
        }
    }
}

/// Fixed texts used when composing labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelTexts {
    /// Replaces hierarchy dots in base codes and joins label parts.
    pub separator: String,
    pub building: String,
    pub paved: String,
    pub public: String,
    pub non_public: String,
}

impl Default for LabelTexts {
    fn default() -> Self {
        Self {
            separator: " - ".to_string(),
            building: "Gebäude".to_string(),
            paved: "befestigt - uebrige befestigte".to_string(),
            public: "öffentlicher Raum".to_string(),
            non_public: "kein öffentlicher Raum".to_string(),
        }
    }
}

/// Immutable configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum public-space coverage (percent, inclusive) to call a polygon public.
    pub threshold_pct: f64,
    pub culture_max_distance: f64,
    /// Zero requires the school point to lie inside (or on) the building.
    pub school_max_distance: f64,
    /// Planar CRS for overlay and distance computations.
    pub metric_epsg: u32,
    /// Geodetic CRS of the persisted output.
    pub output_epsg: u32,
    pub building_code: String,
    pub paved_code: String,
    /// Building category code -> human readable text.
    pub categories: BTreeMap<String, String>,
    pub labels: LabelTexts,
    pub layers: LayerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let categories = [
            ("1010", "Provisorische Unterkunft"),
            ("1020", "Gebäude ausschliesslich für Wohnnutzung"),
            ("1021", "Einfamilienhaus, ohne Nebennutzung"),
            ("1025", "Mehrfamilienhaus, ohne Nebennutzung"),
            ("1030", "Wohngebäude mit Nebennutzung"),
            ("1040", "Gebäude mit teilweiser Wohnnutzung"),
            ("1060", "Gebäude ohne Wohnnutzung"),
            ("1080", "Sonderbau"),
        ];

        Self {
            threshold_pct: 50.0,
            culture_max_distance: 30.0,
            school_max_distance: 0.0,
            metric_epsg: 2056,
            output_epsg: 4326,
            building_code: "Gebaeude.Gebaeude".to_string(),
            paved_code: "befestigt.uebrige_befestigte.uebrige_befestigte".to_string(),
            categories: categories.iter()
                .map(|(code, text)| (code.to_string(), text.to_string()))
                .collect(),
            labels: LabelTexts::default(),
            layers: LayerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a configuration from a JSON file. Absent fields take their default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Failed to parse {}", path.display()))
    }

    /// Fail fast on anything that would make every downstream label wrong.
    pub fn validate(&self) -> AttributionResult<()> {
        let missing = |what: &str| Err(AttributionError::ConfigurationMissing(what.to_string()));

        if self.categories.is_empty() {
            return missing("building category dictionary is empty");
        }
        if !self.threshold_pct.is_finite() || !(0.0..=100.0).contains(&self.threshold_pct) {
            return missing("threshold_pct must be a percentage in [0, 100]");
        }
        for (name, value) in [
            ("culture_max_distance", self.culture_max_distance),
            ("school_max_distance", self.school_max_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AttributionError::ConfigurationMissing(
                    format!("{name} must be a non-negative distance")));
            }
        }
        if self.building_code.trim().is_empty() { return missing("building_code is empty") }
        if self.paved_code.trim().is_empty() { return missing("paved_code is empty") }
        if self.layers.base.is_empty() { return missing("no base land-cover layer configured") }
        if self.layers.base_code_field.is_empty() { return missing("base_code_field is empty") }

        for epsg in [self.metric_epsg, self.output_epsg] {
            if !is_supported_epsg(epsg) { return Err(AttributionError::UnsupportedCrs(epsg)) }
        }
        Ok(())
    }
}
