//! Relationship inference: FATHER, MOTHER, SPOUSE, SIBLING and VOTES_AT
//! passes over committed persons, in keyset pages ordered by identity key.
//!
//! Each page statement selects up to `$limit` candidate persons with
//! `national_no > $after`, links them in a subquery, and reports the page
//! size, its last key and the number of relationships created.

use neo4rs::Query;
use tracing::{debug, info};

use canvass_core::ingest::{Checkpoint, Stage};
use canvass_core::{CanvassError, CanvassResult};

use super::{IngestReport, Pipeline, StageReport};

const PAGE_TAIL: &str = "RETURN size(page) AS scanned,
            CASE WHEN size(page) = 0 THEN null ELSE page[size(page) - 1].national_no END AS last_key,
            created";

const LINK_FATHER: &str = "MATCH (child:Person)
     WHERE child.national_no > $after AND child.father_national_no IS NOT NULL
     WITH child ORDER BY child.national_no LIMIT $limit
     WITH collect(child) AS page
     CALL {
         WITH page
         UNWIND page AS child
         MATCH (father:Person {national_no: child.father_national_no})
         WHERE father <> child AND NOT (father)-[:FATHER]->(child)
         MERGE (father)-[:FATHER]->(child)
         RETURN count(*) AS created
     }";

const LINK_MOTHER: &str = "MATCH (child:Person)
     WHERE child.national_no > $after AND child.mother_national_no IS NOT NULL
     WITH child ORDER BY child.national_no LIMIT $limit
     WITH collect(child) AS page
     CALL {
         WITH page
         UNWIND page AS child
         MATCH (mother:Person {national_no: child.mother_national_no})
         WHERE mother <> child AND NOT (mother)-[:MOTHER]->(child)
         MERGE (mother)-[:MOTHER]->(child)
         RETURN count(*) AS created
     }";

// Co-parents of any child, linked once per couple in either direction.
const LINK_SPOUSE: &str = "MATCH (child:Person)
     WHERE child.national_no > $after
       AND child.father_national_no IS NOT NULL
       AND child.mother_national_no IS NOT NULL
     WITH child ORDER BY child.national_no LIMIT $limit
     WITH collect(child) AS page
     CALL {
         WITH page
         UNWIND page AS child
         MATCH (f:Person)-[:FATHER]->(child)<-[:MOTHER]-(m:Person)
         WHERE f <> m
         WITH DISTINCT f, m
         WHERE NOT (f)-[:SPOUSE]-(m)
         MERGE (f)-[:SPOUSE]->(m)
         RETURN count(*) AS created
     }";

// Each unordered pair is emitted only from its greater identity key.
const LINK_SIBLING: &str = "MATCH (p1:Person)
     WHERE p1.national_no > $after AND p1.father_national_no IS NOT NULL
     WITH p1 ORDER BY p1.national_no LIMIT $limit
     WITH collect(p1) AS page
     CALL {
         WITH page
         UNWIND page AS p1
         MATCH (f:Person)-[:FATHER]->(p1)
         MATCH (f)-[:FATHER]->(p2:Person)
         WHERE p1.national_no > p2.national_no
         WITH DISTINCT p1, p2
         WHERE NOT (p1)-[:SIBLING]-(p2)
         MERGE (p1)-[:SIBLING]->(p2)
         RETURN count(*) AS created
     }";

const LINK_VOTES_AT: &str = "MATCH (person:Person)
     WHERE person.national_no > $after AND person.box IS NOT NULL
     WITH person ORDER BY person.national_no LIMIT $limit
     WITH collect(person) AS page
     CALL {
         WITH page
         UNWIND page AS person
         MATCH (box:Box {name: person.box, center: person.center, circle: person.circle})
         WHERE NOT (person)-[:VOTES_AT]->(box)
         MERGE (person)-[:VOTES_AT]->(box)
         RETURN count(*) AS created
     }";

fn page_statement(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Father => Some(LINK_FATHER),
        Stage::Mother => Some(LINK_MOTHER),
        Stage::Spouse => Some(LINK_SPOUSE),
        Stage::Sibling => Some(LINK_SIBLING),
        Stage::VotesAt => Some(LINK_VOTES_AT),
        _ => None,
    }
}

/// The keyset page statement for a link stage.
pub(crate) fn link_page_query(stage: Stage, after: Option<&str>, limit: usize) -> CanvassResult<Query> {
    let statement = page_statement(stage).ok_or_else(|| {
        CanvassError::validation(format!("stage '{}' is not a relationship pass", stage))
    })?;
    Ok(Query::new(format!("{}\n     {}", statement, PAGE_TAIL))
        .param("after", after.unwrap_or(""))
        .param("limit", limit as i64))
}

impl Pipeline<'_> {
    /// Run the five relationship passes in dependency order.
    pub async fn relate(&mut self) -> CanvassResult<IngestReport> {
        let mut report = IngestReport::new();
        for stage in Stage::LINK {
            report.stages.push(self.link_stage(stage).await?);
        }
        Ok(report.finish())
    }

    async fn link_stage(&mut self, stage: Stage) -> CanvassResult<StageReport> {
        let (mut offset, mut cursor) = match self.begin_stage(stage) {
            Ok(start) => start,
            Err(skipped) => return Ok(skipped),
        };
        let mut report = StageReport::new(stage);
        let limit = self.config().link_batch_size;
        let store = self.store();

        loop {
            self.check_cancelled()?;
            let after = cursor.clone();
            let page = self
                .run_batch(stage, offset, after.as_deref(), || {
                    store.link_page(stage, after.as_deref(), limit)
                })
                .await?;

            if page.scanned == 0 {
                break;
            }
            offset += page.scanned;
            if page.last_key.is_some() {
                cursor = page.last_key;
            }
            report.batches += 1;
            report.rows += page.scanned;
            report.written += page.created;
            self.commit(Checkpoint {
                stage,
                offset,
                cursor: cursor.clone(),
                batches: report.batches,
            })?;
            debug!(%stage, offset, created = page.created, cursor = ?cursor, "Committed link page");

            if page.scanned < limit {
                break;
            }
        }

        self.commit(Checkpoint {
            stage,
            offset,
            cursor,
            batches: report.batches,
        })?;
        info!(
            %stage,
            relationship = stage.relationship_type().unwrap_or(""),
            scanned = report.rows,
            created = report.written,
            batches = report.batches,
            "Relationship pass complete"
        );
        Ok(report)
    }
}
