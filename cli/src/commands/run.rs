use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use landuse::{write_geojson, write_qa_table, write_stats, GeoJsonDirSource, PipelineConfig};
use tracing::info;

const GEOJSON: &str = "landuse.geojson";
const CSV: &str = "landuse.csv";
const STATS: &str = "stats.json";

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(threshold) = args.threshold { config.threshold_pct = threshold }
    if let Some(distance) = args.culture_max_distance { config.culture_max_distance = distance }
    if let Some(distance) = args.school_max_distance { config.school_max_distance = distance }

    if !args.input.is_dir() {
        bail!("[run] input {} is not a directory", args.input.display());
    }

    let out_dir: PathBuf = args.output.clone().unwrap_or(".".into());
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("[run] Failed to create {}", out_dir.display()))?;

    let [geojson_path, csv_path, stats_path] = [GEOJSON, CSV, STATS].map(|name| out_dir.join(name));
    if !args.force {
        for path in [&geojson_path, &csv_path, &stats_path] {
            if path.exists() { bail!("[run] {} already exists (use --force to overwrite)", path.display()) }
        }
    }

    info!("[run] reading layers from {}", args.input.display());
    let source = GeoJsonDirSource::new(&args.input);
    let output = landuse::run(&source, &config).context("[run] attribution failed")?;

    write_geojson(&output.records, config.metric_epsg, config.output_epsg, &geojson_path)?;
    write_qa_table(&output.records, &csv_path)?;
    write_stats(&output.stats, &stats_path)?;

    if cli.verbose > 0 {
        eprintln!(
            "[run] {} polygons labelled, {} layers unavailable, {} stages skipped",
            output.records.len(), output.stats.unavailable_layers.len(), output.stats.skipped_stages.len(),
        );
    }
    println!("[run] wrote {}, {} and {} to {}", GEOJSON, CSV, STATS, out_dir.display());

    Ok(())
}
