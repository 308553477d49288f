//! Batch ingestion pipeline: roster load, relationship inference and
//! campaign overlays, with retries, per-batch timeouts, cancellation and
//! resumable checkpoints.
//!
//! Every batch is awaited before the next one starts, so each stage only
//! reads data committed by the stages before it.

pub mod campaign;
pub mod loader;
pub mod relationships;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use canvass_core::config::IngestConfig;
use canvass_core::ingest::{Checkpoint, Stage};
use canvass_core::{CanvassError, CanvassResult};

use crate::store::CanvassStore;

pub use campaign::CampaignReport;

/// Upper bound on a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub batches: usize,
    /// Rows or candidates processed.
    pub rows: usize,
    /// Nodes or relationships written.
    pub written: usize,
    /// Completed by an earlier run, per the resume checkpoint.
    pub skipped: bool,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            batches: 0,
            rows: 0,
            written: 0,
            skipped: false,
        }
    }

    fn skipped(stage: Stage) -> Self {
        Self {
            skipped: true,
            ..Self::new(stage)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
}

impl IngestReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn written(&self, stage: Stage) -> usize {
        self.stage(stage).map(|s| s.written).unwrap_or(0)
    }

    pub fn merge(&mut self, other: IngestReport) {
        self.stages.extend(other.stages);
        self.finished_at = other.finished_at;
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

impl Default for IngestReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives ingestion stages against a store.
pub struct Pipeline<'a> {
    store: &'a dyn CanvassStore,
    config: IngestConfig,
    cancel: Arc<AtomicBool>,
    checkpoint_path: Option<PathBuf>,
    resume: Option<Checkpoint>,
    position: Checkpoint,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn CanvassStore, config: IngestConfig) -> Self {
        Self {
            store,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            checkpoint_path: None,
            resume: None,
            position: Checkpoint::start_of(Stage::Locations),
        }
    }

    /// Share a cancellation flag. Setting it stops the run before the next batch.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Persist the checkpoint to `path` after every committed batch.
    pub fn with_checkpoint_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Skip work committed before `checkpoint`.
    pub fn resume_from(mut self, checkpoint: Checkpoint) -> Self {
        self.position = checkpoint.clone();
        self.resume = Some(checkpoint);
        self
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// The last committed position.
    pub fn position(&self) -> &Checkpoint {
        &self.position
    }

    pub(crate) fn store(&self) -> &'a dyn CanvassStore {
        self.store
    }

    pub(crate) fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Where `stage` should start, or a skipped report when a resumed run
    /// already completed it.
    pub(crate) fn begin_stage(&mut self, stage: Stage) -> Result<(usize, Option<String>), StageReport> {
        let start = match &self.resume {
            Some(checkpoint) => checkpoint.resume_point(stage),
            None => Some((0, None)),
        };
        match start {
            Some((offset, cursor)) => {
                self.position = Checkpoint {
                    stage,
                    offset,
                    cursor: cursor.clone(),
                    batches: 0,
                };
                Ok((offset, cursor))
            }
            None => {
                debug!(%stage, "Stage completed by an earlier run, skipping");
                Err(StageReport::skipped(stage))
            }
        }
    }

    pub(crate) fn check_cancelled(&self) -> CanvassResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            warn!(checkpoint = %self.position, "Ingestion cancelled");
            return Err(CanvassError::Cancelled {
                checkpoint: self.position.clone(),
            });
        }
        Ok(())
    }

    /// Record a committed batch.
    pub(crate) fn commit(&mut self, checkpoint: Checkpoint) -> CanvassResult<()> {
        if let Some(path) = &self.checkpoint_path {
            checkpoint.save(path)?;
        }
        self.position = checkpoint;
        Ok(())
    }

    /// Run one batch under the configured timeout, retrying retryable
    /// failures with exponential backoff. Exhausted retries become a
    /// `BatchWrite` error carrying the resume position.
    pub(crate) async fn run_batch<T, F, Fut>(
        &self,
        stage: Stage,
        offset: usize,
        cursor: Option<&str>,
        mut op: F,
    ) -> CanvassResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CanvassResult<T>>,
    {
        let secs = self.config.batch_timeout_secs;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(Duration::from_secs(secs), op()).await {
                Ok(result) => result,
                Err(_) => Err(CanvassError::BatchTimeout { secs }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let delay = backoff(self.config.retry_backoff_ms, attempt);
                    warn!(
                        %stage,
                        offset,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    error!(%stage, offset, attempts = attempt, error = %e, "Batch failed permanently");
                    return Err(CanvassError::BatchWrite {
                        stage,
                        offset,
                        cursor: cursor.map(String::from),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(500, 1), Duration::from_millis(500));
        assert_eq!(backoff(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff(500, 3), Duration::from_millis(2000));
        assert_eq!(backoff(500, 30), MAX_BACKOFF);
    }

    #[test]
    fn test_report_lookup() {
        let mut report = IngestReport::new();
        let mut stage = StageReport::new(Stage::Father);
        stage.written = 4;
        report.stages.push(stage);
        assert_eq!(report.written(Stage::Father), 4);
        assert_eq!(report.written(Stage::Mother), 0);
    }
}
