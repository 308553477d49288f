//! Campaign overlay merge: replaces the mutable campaign fields of existing
//! persons. Never creates nodes or touches relationships.

use neo4rs::{BoltType, Query};
use serde::Serialize;
use tracing::{debug, info, warn};

use canvass_core::campaign::{CampaignUpdate, OverlayJoin, PreparedOverlay};
use canvass_core::ingest::{Checkpoint, Stage};
use canvass_core::CanvassResult;

use super::{Pipeline, StageReport};
use crate::bolt;

/// Unmatched keys kept in the report.
pub const UNMATCHED_SAMPLE: usize = 20;

const SET_FIELDS: &str = "SET p.phone_number = row.phone_number,
             p.credibility = row.credibility,
             p.type = row.type,
             p.principal_coordinator = row.principal_coordinator,
             p.sub_coordinator = row.sub_coordinator,
             p.Y_2013 = row.Y_2013,
             p.Y_2016 = row.Y_2016,
             p.Y_2020 = row.Y_2020,
             p.Y_2021 = row.Y_2021,
             p.Y_2024 = row.Y_2024";

const MATCH_BY_NATIONAL_NO: &str = "OPTIONAL MATCH (p:Person {national_no: row.key})";
const MATCH_BY_PRIMARY_KEY: &str = "OPTIONAL MATCH (p:Person {primary_key: row.key})";

fn statement(join: OverlayJoin) -> String {
    let matcher = match join {
        OverlayJoin::NationalNo => MATCH_BY_NATIONAL_NO,
        OverlayJoin::PrimaryKey => MATCH_BY_PRIMARY_KEY,
    };
    format!(
        "UNWIND $rows AS row
     {matcher}
     FOREACH (hit IN CASE WHEN p IS NULL THEN [] ELSE [1] END |
         {SET_FIELDS}
     )
     RETURN count(p) AS matched,
            collect(CASE WHEN p IS NULL THEN row.key END) AS unmatched"
    )
}

fn update_row(update: &CampaignUpdate) -> BoltType {
    let mut entries = vec![("key", bolt::string(&update.key))];
    entries.extend(
        update
            .fields
            .entries()
            .into_iter()
            .map(|(name, value)| (name, bolt::opt_string(value))),
    );
    bolt::map(entries)
}

pub(crate) fn campaign_query(join: OverlayJoin, batch: &[CampaignUpdate]) -> Query {
    Query::new(statement(join)).param("rows", bolt::list(batch.iter().map(update_row).collect()))
}

/// Outcome of an overlay run.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub stage: StageReport,
    pub join: OverlayJoin,
    pub matched: usize,
    pub unmatched: usize,
    pub unmatched_sample: Vec<String>,
    pub rows_without_key: usize,
    pub superseded_rows: usize,
}

impl Pipeline<'_> {
    /// Merge a prepared overlay into existing persons, in node-sized batches.
    pub async fn apply_overlay(
        &mut self,
        overlay: &PreparedOverlay,
        join: OverlayJoin,
    ) -> CanvassResult<CampaignReport> {
        let mut report = CampaignReport {
            stage: StageReport::new(Stage::Campaign),
            join,
            matched: 0,
            unmatched: 0,
            unmatched_sample: Vec::new(),
            rows_without_key: overlay.rows_without_key,
            superseded_rows: overlay.superseded_rows,
        };
        let mut offset = match self.begin_stage(Stage::Campaign) {
            Ok((offset, _)) => offset,
            Err(skipped) => {
                report.stage = skipped;
                return Ok(report);
            }
        };

        let updates = &overlay.updates;
        let batch_size = self.config().node_batch_size;
        let store = self.store();

        while offset < updates.len() {
            self.check_cancelled()?;
            let end = (offset + batch_size).min(updates.len());
            let batch = &updates[offset..end];
            let outcome = self
                .run_batch(Stage::Campaign, offset, None, || store.apply_campaign(join, batch))
                .await?;

            report.stage.batches += 1;
            report.stage.rows += batch.len();
            report.stage.written += outcome.matched;
            report.matched += outcome.matched;
            report.unmatched += outcome.unmatched_keys.len();
            let room = UNMATCHED_SAMPLE.saturating_sub(report.unmatched_sample.len());
            report
                .unmatched_sample
                .extend(outcome.unmatched_keys.into_iter().take(room));

            offset = end;
            self.commit(Checkpoint {
                stage: Stage::Campaign,
                offset,
                cursor: None,
                batches: report.stage.batches,
            })?;
            debug!(offset, total = updates.len(), matched = outcome.matched, "Committed overlay batch");
        }

        self.commit(Checkpoint {
            stage: Stage::Campaign,
            offset,
            cursor: None,
            batches: report.stage.batches,
        })?;
        if report.unmatched > 0 {
            warn!(
                unmatched = report.unmatched,
                sample = ?report.unmatched_sample,
                "Overlay rows matched no person and were dropped"
            );
        }
        info!(
            join = join.column(),
            matched = report.matched,
            unmatched = report.unmatched,
            without_key = report.rows_without_key,
            "Campaign overlay applied"
        );
        Ok(report)
    }
}
