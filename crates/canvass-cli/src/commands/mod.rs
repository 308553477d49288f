//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use canvass_core::config::CanvassConfig;
use canvass_graph::Neo4jStore;

use crate::output::OutputFormat;

pub mod ingest;
pub mod query;
pub mod status;

/// Canvass - electoral canvassing graph loader and query tool
#[derive(Parser)]
#[command(name = "canvass")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (defaults to ./canvass.toml when present)
    #[arg(short, long, global = true, env = "CANVASS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load rosters, infer relationships and apply campaign overlays
    #[command(subcommand)]
    Ingest(ingest::IngestCommands),

    /// Query the canvassing graph
    #[command(subcommand)]
    Query(query::QueryCommands),

    /// Show node and relationship totals
    Status,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = CanvassConfig::load(self.config.as_deref()).context("Failed to load configuration")?;
        let format = OutputFormat::from_json_flag(self.json);

        match self.command {
            Commands::Ingest(cmd) => ingest::execute(cmd, &config, format).await,
            Commands::Query(cmd) => query::execute(cmd, &config, format).await,
            Commands::Status => status::execute(&config, format).await,
        }
    }
}

/// Connect to the configured Neo4j database.
pub(crate) async fn connect(config: &CanvassConfig) -> Result<Neo4jStore> {
    Neo4jStore::connect(&config.neo4j)
        .await
        .with_context(|| format!("Could not connect to Neo4j at {}", config.neo4j.uri))
}
