//! # Canvass Graph
//!
//! Neo4j integration for the canvassing graph: connection handling,
//! schema, the [`CanvassStore`] seam with Neo4j and in-memory backends,
//! the batch ingestion pipeline and the read-path query services.

pub mod bolt;
pub mod client;
pub mod ingest;
pub mod queries;
pub mod schema;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use ingest::{CampaignReport, IngestReport, Pipeline, StageReport};
pub use store::{CanvassStore, GraphCounts, MemoryStore, Neo4jStore};
