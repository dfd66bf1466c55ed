//! Command-line interface definitions.

pub mod check;
pub mod market;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// exchange-sim - A simulated exchange with a background price random walk.
#[derive(Parser, Debug)]
#[command(name = "exchange-sim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seed the catalog and run the price simulator until Ctrl-C
    Run(RunArgs),

    /// Validate a configuration file
    Check(ConfigPathArg),

    /// Print every product with its stock and latest price
    Market(MarketArgs),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the database URL
    #[arg(long)]
    pub database: Option<String>,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,

    /// Fix the simulator's RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop on its own after this many seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

/// Arguments for the `market` subcommand.
#[derive(Parser, Debug)]
pub struct MarketArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
