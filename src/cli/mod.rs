//! CLI module for tradecost
//!
//! Argument parsing with clap and a structured command pattern: one file per
//! subcommand under `commands/`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

use crate::config::AppConfig;
use crate::data_paths::{DataPaths, DEFAULT_DATA_DIR};

use commands::impact::{ImpactArgs, ImpactCommand};
use commands::stream::{StreamArgs, StreamCommand};

#[derive(Parser)]
#[command(name = "tradecost")]
#[command(version)]
#[command(about = "Live trade-cost estimator over an L2 order-book feed", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory path (default: ./data)
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Optional YAML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream live market data and print per-tick cost estimates
    Stream(StreamArgs),

    /// Evaluate the closed-form market impact model offline
    Impact(ImpactArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let data_paths = DataPaths::new(&self.data_dir);
        data_paths.ensure_directories()?;

        let config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        match self.command {
            Commands::Stream(args) => StreamCommand::new(args).execute(config, data_paths).await,
            Commands::Impact(args) => ImpactCommand::new(args).execute(config).await,
        }
    }
}
