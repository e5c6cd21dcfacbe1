//! CiteGraph CLI - Citation graph building and lookups
//!
//! A command-line interface for turning the raw citation dumps into
//! per-vocabulary indexes and asking "what does X cite" / "what cites X".
//!
//! # Usage
//!
//! ```bash
//! # Build the PubMed and DOI indexes
//! citegraph build pmid doi
//!
//! # What does this paper cite?
//! citegraph outgoing pmid:33917884
//!
//! # What cites it?
//! citegraph incoming pmid:33917884 --json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use citegraph_config::{ConfigOverrides, LogFormat, LoggingConfig};
use clap::{Args, Parser, Subcommand};
use commands::query::Direction;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod progress;

/// CiteGraph - Citation graph lookups across identifier vocabularies
#[derive(Parser, Debug)]
#[command(name = "citegraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to an additional configuration file
    #[arg(long, short = 'c', global = true, env = "CITEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding identifier maps, edge streams and indexes
    #[arg(long, global = true, env = "CITEGRAPH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Raw metadata archive (tar.gz of CSV files)
    #[arg(long, global = true, env = "CITEGRAPH_METADATA_ARCHIVE")]
    metadata_archive: Option<PathBuf>,

    /// Raw citation archive (zip of CSV files); repeat for several
    #[arg(long = "citation-archive", global = true)]
    citation_archives: Vec<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_dir: self.data_dir.clone(),
            metadata_archive: self.metadata_archive.clone(),
            citation_archives: if self.citation_archives.is_empty() {
                None
            } else {
                Some(self.citation_archives.clone())
            },
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or open) the index of one or more vocabularies
    Build(commands::build::BuildArgs),

    /// List what an identifier cites
    Outgoing(commands::query::QueryArgs),

    /// List what cites an identifier
    Incoming(commands::query::QueryArgs),

    /// Convert an identifier into another vocabulary
    Convert(commands::query::ConvertArgs),

    /// Show artifact and index status per vocabulary
    Status(commands::status::StatusArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn init_logging(global: &GlobalOptions, logging: &LoggingConfig) -> Result<()> {
    let level = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("Invalid log level '{}'", level))?;

    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(&cli.global)?;
    init_logging(&cli.global, &config.logging)?;

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &config, &cli.global),
        Commands::Outgoing(args) => {
            commands::query::execute(args, Direction::Outgoing, &config, &cli.global)
        }
        Commands::Incoming(args) => {
            commands::query::execute(args, Direction::Incoming, &config, &cli.global)
        }
        Commands::Convert(args) => commands::query::execute_convert(args, &config),
        Commands::Status(args) => commands::status::execute(args, &config),
        Commands::Config(cmd) => commands::config::execute(cmd, &config),
    }
}
