//! The storage seam between the pipeline / query services and a graph backend.

pub mod memory;
pub mod neo4j;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use canvass_core::campaign::{CampaignUpdate, OverlayJoin};
use canvass_core::ingest::Stage;
use canvass_core::query::{CelfParams, InfluenceFilter, LocationScope, RelationshipSet, TraversalFilter};
use canvass_core::roster::{PersonRecord, PollingLocation};
use canvass_core::shape::{
    LocationCounts, LocationOption, RawEdgeRow, RelativeCountRow, RelativeLocationRow, SeedProfile,
    SpreadRow,
};
use canvass_core::CanvassResult;

pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;

/// Node and relationship totals for status display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub persons: u64,
    pub placeholders: u64,
    pub circles: u64,
    pub centers: u64,
    pub boxes: u64,
    /// Relationship count per type.
    pub relationships: BTreeMap<String, u64>,
}

impl GraphCounts {
    pub fn total_nodes(&self) -> u64 {
        self.persons + self.circles + self.centers + self.boxes
    }

    pub fn total_relationships(&self) -> u64 {
        self.relationships.values().sum()
    }

    pub fn relationship(&self, rel_type: &str) -> u64 {
        self.relationships.get(rel_type).copied().unwrap_or(0)
    }
}

/// Outcome of one keyset page of a link pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPage {
    /// Candidate rows in the page.
    pub scanned: usize,
    /// Greatest identity key in the page; the cursor for the next page.
    pub last_key: Option<String>,
    /// Relationships created by the page.
    pub created: usize,
}

/// Outcome of one campaign overlay batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignOutcome {
    pub matched: usize,
    pub unmatched_keys: Vec<String>,
}

/// A graph backend able to host the canvassing graph.
///
/// Write operations are batch-scoped: each call is one transaction and
/// either commits fully or fails. All writes are idempotent.
#[async_trait]
pub trait CanvassStore: Send + Sync {
    /// Ensure constraints and indexes exist.
    async fn ensure_schema(&self) -> CanvassResult<()>;

    /// Upsert Circle / Center / Box nodes and their HAS_CENTER / HAS_BOX edges.
    async fn upsert_locations(&self, batch: &[PollingLocation]) -> CanvassResult<usize>;

    /// Upsert persons by identity key. Structural fields are replaced,
    /// campaign fields untouched, `synthetic` cleared.
    async fn upsert_persons(&self, batch: &[PersonRecord]) -> CanvassResult<usize>;

    /// Create placeholder persons for keys with no Person yet. Returns the
    /// number created.
    async fn create_placeholders(&self, keys: &[String]) -> CanvassResult<usize>;

    /// Run one keyset page of a link stage over persons with identity key
    /// greater than `after`.
    async fn link_page(&self, stage: Stage, after: Option<&str>, limit: usize) -> CanvassResult<LinkPage>;

    /// Apply campaign fields to matching persons. Never creates nodes.
    async fn apply_campaign(&self, join: OverlayJoin, batch: &[CampaignUpdate]) -> CanvassResult<CampaignOutcome>;

    async fn counts(&self) -> CanvassResult<GraphCounts>;

    async fn circles(&self) -> CanvassResult<Vec<LocationOption>>;

    async fn centers(&self, circle_id: &str) -> CanvassResult<Vec<LocationOption>>;

    async fn boxes(&self, circle_id: &str, center_id: &str) -> CanvassResult<Vec<LocationOption>>;

    async fn location_counts(&self, scope: &LocationScope) -> CanvassResult<LocationCounts>;

    /// Persons voting at any box.
    async fn total_voters(&self) -> CanvassResult<u64>;

    /// Persons in scope with their count of distinct relatives voting at the
    /// same box, descending, at most `limit`.
    async fn relative_counts(&self, filter: &TraversalFilter, limit: u32) -> CanvassResult<Vec<RelativeCountRow>>;

    async fn person(&self, national_no: &str) -> CanvassResult<Option<SeedProfile>>;

    /// Relatives reachable from a person, with their location chain.
    async fn relatives(&self, filter: &InfluenceFilter) -> CanvassResult<Vec<RelativeLocationRow>>;

    /// Family and VOTES_AT edges around a person.
    async fn family_edges(&self, filter: &InfluenceFilter, limit: u32) -> CanvassResult<Vec<RawEdgeRow>>;

    /// CELF seeds within a scope, by spread.
    async fn influence_spread(
        &self,
        scope: &LocationScope,
        relationships: &RelationshipSet,
        params: &CelfParams,
    ) -> CanvassResult<Vec<SpreadRow>>;
}
