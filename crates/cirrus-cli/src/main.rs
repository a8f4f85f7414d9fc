//! Cirrus interactive console.

mod shell;
mod tables;

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{ErrorLevel, Verbosity};
use cirrus_core::{CirrusService, CoreConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cirrus", about = "Campus cloud resource rental console", version)]
struct Args {
    /// Path to the configuration file (defaults to ./cirrus.toml when present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the data directory from config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print a default configuration file and exit
    #[arg(long)]
    gen_config: bool,

    #[command(flatten)]
    verbosity: Verbosity<ErrorLevel>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cirrus_common::logging::init_cli_logging(&args.verbosity, "cirrus=info")?;

    if args.gen_config {
        print!("{}", toml::to_string_pretty(&CoreConfig::default())?);
        return Ok(());
    }

    let mut config = CoreConfig::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let mut service = CirrusService::load(config);
    service.seed_defaults()?;

    shell::run(&mut service)?;

    service.save()?;
    Ok(())
}
