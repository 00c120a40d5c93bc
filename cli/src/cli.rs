use std::path::PathBuf;

/// Land-use attribution CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "landuse", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Attribute a land-use label to every surface polygon of a directory of GeoJSON layers
    Run(RunArgs),

    /// Print the default configuration as JSON
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Directory holding one `<layer>.geojson` file per source layer
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub input: PathBuf,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Configuration file (JSON); absent keys take their default
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Minimum public-space coverage in percent
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Maximum distance between a culture point and its building
    #[arg(long)]
    pub culture_max_distance: Option<f64>,

    /// Maximum distance between a school point and its building
    #[arg(long)]
    pub school_max_distance: Option<f64>,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}
