//! TileVault CLI - Command-line interface
//!
//! Downloads map tiles for offline use and manages the stored maps.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilevault::config::{load_config, load_config_from, EngineConfig};
use tilevault::engine::OfflineTiles;
use tilevault::logging::{default_log_dir, default_log_file, init_logging};

use commands::download::DownloadArgs;
use commands::maps::MapAction;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilevault")]
#[command(version = tilevault::VERSION)]
#[command(about = "Download and manage offline map tiles", long_about = None)]
struct Cli {
    /// Config file (default: ~/.tilevault/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Data directory, overriding the config file
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Parallel tile downloads, overriding the config file
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Echo debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available tile providers
    Providers,
    /// Download tiles into a named map
    Download(DownloadArgs),
    #[command(flatten)]
    Maps(MapAction),
}

fn load_engine_config(cli: &Cli) -> Result<EngineConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(CliError::Config)?;

    if let Some(dir) = &cli.data_dir {
        config = config.with_storage_dir(dir);
    }
    if let Some(n) = cli.concurrency {
        config = config.with_concurrency(n);
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let _logging = init_logging(&default_log_dir(), default_log_file(), cli.verbose)
        .map_err(CliError::LoggingInit)?;

    let config = load_engine_config(&cli)?;
    let engine = OfflineTiles::open(&config).await.map_err(CliError::Engine)?;

    match cli.command {
        Commands::Providers => {
            commands::providers::run(&engine);
            Ok(())
        }
        Commands::Download(args) => commands::download::run(&engine, args).await,
        Commands::Maps(action) => commands::maps::run(&engine, action).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}
