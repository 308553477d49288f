//! Graph loader: location hierarchy, persons and placeholder persons.

use neo4rs::{BoltType, Query};
use tracing::{debug, info};

use canvass_core::ingest::{Checkpoint, Stage};
use canvass_core::roster::{NormalizedRoster, PersonRecord, PollingLocation};
use canvass_core::CanvassResult;

use super::{IngestReport, Pipeline, StageReport};
use crate::bolt;
use crate::store::CanvassStore;

const UPSERT_LOCATIONS: &str = "UNWIND $rows AS row
     MERGE (ci:Circle {name: row.circle})
     MERGE (ce:Center {name: row.center, circle: row.circle})
     MERGE (b:Box {name: row.box, center: row.center, circle: row.circle})
     MERGE (ci)-[:HAS_CENTER]->(ce)
     MERGE (ce)-[:HAS_BOX]->(b)
     RETURN count(*) AS written";

// Setting a property to null removes it, so absent roster fields never
// linger from an earlier load.
const UPSERT_PERSONS: &str = "UNWIND $rows AS row
     MERGE (p:Person {national_no: row.national_no})
     SET p.full_name = row.full_name,
         p.first_name = row.first_name,
         p.father_name = row.father_name,
         p.grand_name = row.grand_name,
         p.family_name = row.family_name,
         p.father_national_no = row.father_national_no,
         p.mother_national_no = row.mother_national_no,
         p.new_big_key = row.new_big_key,
         p.dob = row.dob,
         p.age = row.age,
         p.religion = row.religion,
         p.address = row.address,
         p.circle = row.circle,
         p.center = row.center,
         p.box = row.box,
         p.primary_key = row.primary_key,
         p.synthetic = false
     RETURN count(*) AS written";

const CREATE_PLACEHOLDERS: &str = "UNWIND $keys AS key
     OPTIONAL MATCH (existing:Person {national_no: key})
     WITH key, existing
     WHERE existing IS NULL
     CREATE (:Person {national_no: key, synthetic: true})
     RETURN count(*) AS written";

fn location_row(loc: &PollingLocation) -> BoltType {
    bolt::map([
        ("circle", bolt::string(&loc.circle)),
        ("center", bolt::string(&loc.center)),
        ("box", bolt::string(&loc.box_name)),
    ])
}

fn person_row(p: &PersonRecord) -> BoltType {
    let text = |v: &Option<String>| bolt::opt_string(v.as_deref());
    bolt::map([
        ("national_no", bolt::string(&p.national_no)),
        ("full_name", text(&p.full_name)),
        ("first_name", text(&p.first_name)),
        ("father_name", text(&p.father_name)),
        ("grand_name", text(&p.grand_name)),
        ("family_name", text(&p.family_name)),
        ("father_national_no", text(&p.father_national_no)),
        ("mother_national_no", text(&p.mother_national_no)),
        ("new_big_key", text(&p.new_big_key)),
        ("dob", text(&p.dob)),
        ("age", bolt::opt_int(p.age)),
        ("religion", text(&p.religion)),
        ("address", text(&p.address)),
        ("circle", text(&p.circle)),
        ("center", text(&p.center)),
        ("box", text(&p.box_name)),
        ("primary_key", text(&p.primary_key)),
    ])
}

pub(crate) fn locations_query(batch: &[PollingLocation]) -> Query {
    Query::new(UPSERT_LOCATIONS.to_string())
        .param("rows", bolt::list(batch.iter().map(location_row).collect()))
}

pub(crate) fn persons_query(batch: &[PersonRecord]) -> Query {
    Query::new(UPSERT_PERSONS.to_string())
        .param("rows", bolt::list(batch.iter().map(person_row).collect()))
}

pub(crate) fn placeholders_query(keys: &[String]) -> Query {
    Query::new(CREATE_PLACEHOLDERS.to_string())
        .param("keys", bolt::list(keys.iter().map(|k| bolt::string(k)).collect()))
}

/// One load batch, by node kind.
enum Chunk<'b> {
    Locations(&'b [PollingLocation]),
    Persons(&'b [PersonRecord]),
    Placeholders(&'b [String]),
}

async fn write_chunk(store: &dyn CanvassStore, chunk: &Chunk<'_>) -> CanvassResult<usize> {
    match chunk {
        Chunk::Locations(batch) => store.upsert_locations(batch).await,
        Chunk::Persons(batch) => store.upsert_persons(batch).await,
        Chunk::Placeholders(keys) => store.create_placeholders(keys).await,
    }
}

impl Pipeline<'_> {
    /// Materialize a normalized roster: schema, locations, persons, then
    /// placeholders for parents absent from the roster.
    pub async fn load(&mut self, roster: &NormalizedRoster) -> CanvassResult<IngestReport> {
        let planned = roster.planned_nodes();
        info!(
            persons = planned.persons,
            placeholders = planned.placeholders,
            circles = planned.circles,
            centers = planned.centers,
            boxes = planned.boxes,
            total = planned.total(),
            "Loading roster into graph"
        );

        self.store().ensure_schema().await?;

        let placeholder_keys = roster.placeholder_keys();
        let mut report = IngestReport::new();
        report.stages.push(
            self.load_stage(Stage::Locations, &roster.locations, |b| Chunk::Locations(b))
                .await?,
        );
        report
            .stages
            .push(self.load_stage(Stage::Persons, &roster.persons, |b| Chunk::Persons(b)).await?);
        report.stages.push(
            self.load_stage(Stage::Placeholders, &placeholder_keys, |b| Chunk::Placeholders(b))
                .await?,
        );

        Ok(report.finish())
    }

    async fn load_stage<T>(
        &mut self,
        stage: Stage,
        items: &[T],
        wrap: for<'b> fn(&'b [T]) -> Chunk<'b>,
    ) -> CanvassResult<StageReport> {
        let (mut offset, _) = match self.begin_stage(stage) {
            Ok(start) => start,
            Err(skipped) => return Ok(skipped),
        };
        let mut report = StageReport::new(stage);
        let batch_size = self.config().node_batch_size;

        while offset < items.len() {
            self.check_cancelled()?;
            let end = (offset + batch_size).min(items.len());
            let chunk = wrap(&items[offset..end]);
            let store = self.store();
            let written = self
                .run_batch(stage, offset, None, || write_chunk(store, &chunk))
                .await?;

            report.batches += 1;
            report.rows += end - offset;
            report.written += written;
            offset = end;
            self.commit(Checkpoint {
                stage,
                offset,
                cursor: None,
                batches: report.batches,
            })?;
            debug!(%stage, offset, total = items.len(), written, "Committed load batch");
        }

        self.commit(Checkpoint {
            stage,
            offset,
            cursor: None,
            batches: report.batches,
        })?;
        info!(%stage, rows = report.rows, written = report.written, batches = report.batches, "Stage complete");
        Ok(report)
    }
}
