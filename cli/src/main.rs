mod cli;
mod commands;

use cli::{Cli, Commands};
use tracing_subscriber::{fmt, EnvFilter};

/// Map the -v count onto a default filter; `RUST_LOG` takes precedence.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run(args) => commands::run(&cli, args),
        Commands::Config => commands::config(&cli),
    }
}

fn main() -> anyhow::Result<()> { run() }
