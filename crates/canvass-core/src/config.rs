//! Runtime configuration: graph connection, ingestion tuning and the roster
//! filter, read from an optional TOML file and overridden by environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CanvassError, CanvassResult};
use crate::roster::RosterFilter;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "canvass.toml";

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
            max_connections: 8,
            fetch_size: 500,
        }
    }
}

/// Batch sizes and failure handling for the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub node_batch_size: usize,
    pub link_batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub batch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            node_batch_size: 10_000,
            link_batch_size: 50_000,
            max_retries: 3,
            retry_backoff_ms: 500,
            batch_timeout_secs: 300,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> CanvassResult<()> {
        if self.node_batch_size == 0 {
            return Err(CanvassError::Config("node_batch_size must be positive".into()));
        }
        if self.link_batch_size == 0 {
            return Err(CanvassError::Config("link_batch_size must be positive".into()));
        }
        if self.batch_timeout_secs == 0 {
            return Err(CanvassError::Config("batch_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvassConfig {
    pub neo4j: GraphConfig,
    pub ingest: IngestConfig,
    pub roster: RosterFilter,
}

impl CanvassConfig {
    /// Load from `path`, or from `canvass.toml` when present, then apply
    /// `NEO4J__*` environment overrides.
    pub fn load(path: Option<&Path>) -> CanvassResult<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match file {
            Some(file) => {
                debug!(path = %file.display(), "Loading config file");
                let text = std::fs::read_to_string(&file)?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.ingest.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> CanvassResult<Self> {
        toml::from_str(text).map_err(|e| CanvassError::Config(e.to_string()))
    }

    /// Override connection settings from `NEO4J__URI`, `NEO4J__USER`,
    /// `NEO4J__PASSWORD` and `NEO4J__DATABASE`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let neo4j = &mut self.neo4j;
        for (key, slot) in [
            ("NEO4J__URI", &mut neo4j.uri),
            ("NEO4J__USER", &mut neo4j.user),
            ("NEO4J__PASSWORD", &mut neo4j.password),
            ("NEO4J__DATABASE", &mut neo4j.database),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }
}
