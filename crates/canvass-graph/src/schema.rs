//! Neo4j schema initialization (constraints and indexes).

use anyhow::{Context, Result};
use neo4rs::Query;
use tracing::{debug, info};

use crate::GraphClient;

/// Cypher statements for schema initialization.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // Uniqueness constraints
    "CREATE CONSTRAINT person_national_no IF NOT EXISTS FOR (p:Person) REQUIRE p.national_no IS UNIQUE",
    "CREATE CONSTRAINT circle_name IF NOT EXISTS FOR (c:Circle) REQUIRE c.name IS UNIQUE",
    "CREATE CONSTRAINT center_key IF NOT EXISTS FOR (c:Center) REQUIRE (c.name, c.circle) IS UNIQUE",
    "CREATE CONSTRAINT box_key IF NOT EXISTS FOR (b:Box) REQUIRE (b.name, b.center, b.circle) IS UNIQUE",
    // Lookup indexes for the link passes and overlay joins
    "CREATE INDEX person_father IF NOT EXISTS FOR (p:Person) ON (p.father_national_no)",
    "CREATE INDEX person_mother IF NOT EXISTS FOR (p:Person) ON (p.mother_national_no)",
    "CREATE INDEX person_primary_key IF NOT EXISTS FOR (p:Person) ON (p.primary_key)",
    "CREATE INDEX person_synthetic IF NOT EXISTS FOR (p:Person) ON (p.synthetic)",
    "CREATE INDEX person_location IF NOT EXISTS FOR (p:Person) ON (p.box, p.center, p.circle)",
];

/// Ensure every constraint and index exists. Idempotent.
pub async fn initialize_schema(client: &GraphClient) -> Result<usize> {
    for statement in SCHEMA_STATEMENTS {
        client
            .execute(Query::new(statement.to_string()))
            .await
            .with_context(|| format!("Schema statement failed: {}", statement))?;
        debug!(statement, "Applied schema statement");
    }

    info!(statements = SCHEMA_STATEMENTS.len(), "Graph schema ready");
    Ok(SCHEMA_STATEMENTS.len())
}
