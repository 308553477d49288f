//! Neo4j implementation of [`CanvassStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use neo4rs::{Query, Row};
use tracing::{debug, warn};

use canvass_core::campaign::{CampaignUpdate, OverlayJoin};
use canvass_core::config::GraphConfig;
use canvass_core::ingest::Stage;
use canvass_core::query::{builder, CelfParams, CypherQuery, InfluenceFilter, LocationScope, RelationshipSet, TraversalFilter};
use canvass_core::roster::{PersonRecord, PollingLocation};
use canvass_core::shape::{
    LocationCounts, LocationOption, RawEdgeRow, RelativeCountRow, RelativeLocationRow, SeedProfile,
    SpreadRow,
};
use canvass_core::{CanvassError, CanvassResult};

use super::{CampaignOutcome, CanvassStore, GraphCounts, LinkPage};
use crate::bolt::{self, get_opt_string, get_u64};
use crate::ingest::{campaign, loader, relationships};
use crate::{schema, GraphClient};

/// Driver failures surface as retryable store errors, with the full context chain.
fn store_err(e: anyhow::Error) -> CanvassError {
    CanvassError::store(format!("{:#}", e))
}

pub struct Neo4jStore {
    client: GraphClient,
}

impl Neo4jStore {
    /// Connect and verify the server answers.
    pub async fn connect(config: &GraphConfig) -> CanvassResult<Self> {
        let client = GraphClient::connect(config)
            .await
            .map_err(|e| CanvassError::StoreUnavailable(format!("{}: {:#}", config.uri, e)))?;
        debug!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self { client })
    }

    async fn rows(&self, query: Query) -> CanvassResult<Vec<Row>> {
        self.client.query(query).await.map_err(store_err)
    }

    async fn read(&self, cypher: &CypherQuery) -> CanvassResult<Vec<Row>> {
        debug!(query = %cypher.compact_text(), params = ?cypher.params, "Running read query");
        self.rows(bolt::to_query(cypher)).await
    }

    async fn written(&self, query: Query) -> CanvassResult<usize> {
        let rows = self.rows(query).await?;
        Ok(rows.first().map(|r| get_u64(r, "written")).unwrap_or(0) as usize)
    }

    async fn count(&self, text: &str) -> CanvassResult<u64> {
        let value: Option<i64> = self
            .client
            .query_scalar(Query::new(text.to_string()), "count")
            .await
            .map_err(store_err)?;
        Ok(value.unwrap_or(0).max(0) as u64)
    }
}

fn location_options(rows: Vec<Row>) -> Vec<LocationOption> {
    rows.iter()
        .filter_map(|row| {
            Some(LocationOption {
                id: get_opt_string(row, "id")?,
                name: get_opt_string(row, "name").unwrap_or_default(),
            })
        })
        .collect()
}

#[async_trait]
impl CanvassStore for Neo4jStore {
    async fn ensure_schema(&self) -> CanvassResult<()> {
        schema::initialize_schema(&self.client).await.map_err(store_err)?;
        Ok(())
    }

    async fn upsert_locations(&self, batch: &[PollingLocation]) -> CanvassResult<usize> {
        self.written(loader::locations_query(batch)).await
    }

    async fn upsert_persons(&self, batch: &[PersonRecord]) -> CanvassResult<usize> {
        self.written(loader::persons_query(batch)).await
    }

    async fn create_placeholders(&self, keys: &[String]) -> CanvassResult<usize> {
        self.written(loader::placeholders_query(keys)).await
    }

    async fn link_page(&self, stage: Stage, after: Option<&str>, limit: usize) -> CanvassResult<LinkPage> {
        let rows = self.rows(relationships::link_page_query(stage, after, limit)?).await?;
        Ok(rows
            .first()
            .map(|row| LinkPage {
                scanned: get_u64(row, "scanned") as usize,
                last_key: get_opt_string(row, "last_key"),
                created: get_u64(row, "created") as usize,
            })
            .unwrap_or_default())
    }

    async fn apply_campaign(&self, join: OverlayJoin, batch: &[CampaignUpdate]) -> CanvassResult<CampaignOutcome> {
        let rows = self.rows(campaign::campaign_query(join, batch)).await?;
        Ok(rows
            .first()
            .map(|row| CampaignOutcome {
                matched: get_u64(row, "matched") as usize,
                unmatched_keys: row.get::<Vec<String>>("unmatched").unwrap_or_default(),
            })
            .unwrap_or_default())
    }

    async fn counts(&self) -> CanvassResult<GraphCounts> {
        let mut counts = GraphCounts {
            persons: self.count("MATCH (n:Person) RETURN count(n) AS count").await?,
            placeholders: self
                .count("MATCH (n:Person) WHERE n.synthetic = true RETURN count(n) AS count")
                .await?,
            circles: self.count("MATCH (n:Circle) RETURN count(n) AS count").await?,
            centers: self.count("MATCH (n:Center) RETURN count(n) AS count").await?,
            boxes: self.count("MATCH (n:Box) RETURN count(n) AS count").await?,
            relationships: BTreeMap::new(),
        };

        let rows = self
            .rows(Query::new(
                "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(r) AS count".to_string(),
            ))
            .await?;
        for row in &rows {
            if let Some(rel_type) = get_opt_string(row, "rel_type") {
                counts.relationships.insert(rel_type, get_u64(row, "count"));
            }
        }
        Ok(counts)
    }

    async fn circles(&self) -> CanvassResult<Vec<LocationOption>> {
        Ok(location_options(self.read(&builder::list_circles()).await?))
    }

    async fn centers(&self, circle_id: &str) -> CanvassResult<Vec<LocationOption>> {
        Ok(location_options(self.read(&builder::list_centers(circle_id)?).await?))
    }

    async fn boxes(&self, circle_id: &str, center_id: &str) -> CanvassResult<Vec<LocationOption>> {
        Ok(location_options(self.read(&builder::list_boxes(circle_id, center_id)?).await?))
    }

    async fn location_counts(&self, scope: &LocationScope) -> CanvassResult<LocationCounts> {
        let rows = self.read(&builder::location_counts(scope)).await?;
        Ok(rows
            .first()
            .map(|row| LocationCounts {
                num_centers: get_u64(row, "num_centers"),
                num_boxes: get_u64(row, "num_boxes"),
                num_voters: get_u64(row, "num_voters"),
            })
            .unwrap_or_default())
    }

    async fn total_voters(&self) -> CanvassResult<u64> {
        let rows = self.read(&builder::total_voters()).await?;
        Ok(rows.first().map(|r| get_u64(r, "num_voters")).unwrap_or(0))
    }

    async fn relative_counts(&self, filter: &TraversalFilter, limit: u32) -> CanvassResult<Vec<RelativeCountRow>> {
        let rows = self.read(&builder::relative_ranks(filter, limit)?).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(RelativeCountRow {
                    person: bolt::person_summary(row)?,
                    num_relatives: get_u64(row, "num_relatives"),
                })
            })
            .collect())
    }

    async fn person(&self, national_no: &str) -> CanvassResult<Option<SeedProfile>> {
        let rows = self.read(&builder::person_lookup(national_no)?).await?;
        Ok(rows.first().and_then(|row| {
            Some(SeedProfile {
                person: bolt::person_summary(row)?,
                circle: get_opt_string(row, "circle"),
                center: get_opt_string(row, "center"),
                box_name: get_opt_string(row, "box"),
            })
        }))
    }

    async fn relatives(&self, filter: &InfluenceFilter) -> CanvassResult<Vec<RelativeLocationRow>> {
        let rows = self.read(&builder::person_influence(filter)).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(RelativeLocationRow {
                    person: bolt::person_summary(row)?,
                    distance: get_u64(row, "distance") as u32,
                    circle: get_opt_string(row, "circle"),
                    center: get_opt_string(row, "center"),
                    box_name: get_opt_string(row, "box"),
                })
            })
            .collect())
    }

    async fn family_edges(&self, filter: &InfluenceFilter, limit: u32) -> CanvassResult<Vec<RawEdgeRow>> {
        let rows = self.read(&builder::family_graph(filter, limit)).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(RawEdgeRow {
                    from: bolt::raw_node(row, "from")?,
                    to: bolt::raw_node(row, "to")?,
                    rel_type: get_opt_string(row, "rel_type")?,
                })
            })
            .collect())
    }

    async fn influence_spread(
        &self,
        scope: &LocationScope,
        relationships: &RelationshipSet,
        params: &CelfParams,
    ) -> CanvassResult<Vec<SpreadRow>> {
        let graph_name = format!("canvass-celf-{}", uuid::Uuid::new_v4());
        let plan = builder::influence_ranking(scope, relationships, params, &graph_name)?;

        let projected = self.read(&plan.project).await?;
        debug!(
            graph_name = %plan.graph_name,
            nodes = projected.first().map(|r| get_u64(r, "node_count")).unwrap_or(0),
            "Projected family graph"
        );

        let streamed = self.read(&plan.stream).await;

        // The projection lives in server memory until dropped.
        if let Err(e) = self.read(&plan.drop).await {
            warn!(graph_name = %plan.graph_name, error = %e, "Failed to drop graph projection");
        }

        Ok(streamed?
            .iter()
            .filter_map(|row| {
                Some(SpreadRow {
                    person: bolt::person_summary(row)?,
                    spread: row.get::<f64>("spread").unwrap_or(0.0),
                })
            })
            .collect())
    }
}
