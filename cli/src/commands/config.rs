use anyhow::{Context, Result};
use landuse::PipelineConfig;

pub fn config(_cli: &crate::cli::Cli) -> Result<()> {
    let json = serde_json::to_string_pretty(&PipelineConfig::default())
        .context("[config] Failed to serialize the default configuration")?;
    println!("{json}");
    Ok(())
}
