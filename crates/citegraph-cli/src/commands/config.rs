//! Config command - View and manage configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use citegraph_config::{CiteGraphConfig, ConfigLoader};
use clap::Subcommand;
use serde::Serialize;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective (merged) configuration
    Show(ShowArgs),

    /// Write a default global config (~/.citegraph/config.toml) if none exists
    Init,

    /// Show configuration file paths
    Path(PathArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
struct ConfigPaths {
    global: Option<PathBuf>,
    local: PathBuf,
    global_exists: bool,
    local_exists: bool,
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, config: &CiteGraphConfig) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, config),
        ConfigCommand::Init => execute_init(),
        ConfigCommand::Path(args) => execute_path(args),
    }
}

fn execute_show(args: ShowArgs, config: &CiteGraphConfig) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(config).context("Failed to render configuration")?
        );
    }
    Ok(())
}

fn execute_init() -> Result<()> {
    let loader = ConfigLoader::new();
    let path = loader
        .init_global()
        .context("Failed to initialize global configuration")?;
    println!("{}", path.display());
    Ok(())
}

fn execute_path(args: PathArgs) -> Result<()> {
    let workspace = std::env::current_dir().context("Failed to get current directory")?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&workspace);
    let paths = ConfigPaths {
        global_exists: global_path.as_ref().map(|p| p.exists()).unwrap_or(false),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let status = |exists: bool| if exists { "exists" } else { "not found" };
    match paths.global {
        Some(ref path) => println!("Global: {} ({})", path.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!("Local:  {} ({})", paths.local.display(), status(paths.local_exists));
    Ok(())
}
