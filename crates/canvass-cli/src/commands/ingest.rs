//! Ingestion commands: roster load, relationship inference, campaign overlay.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::{info, warn};

use canvass_core::campaign::{self, OverlayJoin, PreparedOverlay};
use canvass_core::config::CanvassConfig;
use canvass_core::ingest::Checkpoint;
use canvass_core::roster::{self, NormalizedRoster};
use canvass_core::CanvassError;
use canvass_graph::{CanvassStore, MemoryStore, Pipeline};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum IngestCommands {
    /// Normalize a roster and load locations, persons and placeholder parents
    Load {
        /// Roster CSV file
        roster: PathBuf,

        /// Load into an in-memory graph and report counts without touching Neo4j
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Infer FATHER, MOTHER, SPOUSE, SIBLING and VOTES_AT relationships
    Relate {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Merge a campaign overlay into existing persons
    Campaign {
        /// Overlay CSV file
        overlay: PathBuf,

        /// Column matching overlay rows to persons
        #[arg(long, value_enum, default_value_t = JoinColumn::NationalNo)]
        join: JoinColumn,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Load, relate and optionally apply an overlay in one run
    All {
        /// Roster CSV file
        roster: PathBuf,

        /// Overlay CSV file applied after relationships are inferred
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Column matching overlay rows to persons
        #[arg(long, value_enum, default_value_t = JoinColumn::NationalNo)]
        join: JoinColumn,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Persist progress to this file after every committed batch
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Continue from the checkpoint file instead of starting over
    #[arg(long, requires = "checkpoint")]
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JoinColumn {
    NationalNo,
    PrimaryKey,
}

impl From<JoinColumn> for OverlayJoin {
    fn from(join: JoinColumn) -> Self {
        match join {
            JoinColumn::NationalNo => OverlayJoin::NationalNo,
            JoinColumn::PrimaryKey => OverlayJoin::PrimaryKey,
        }
    }
}

pub async fn execute(cmd: IngestCommands, config: &CanvassConfig, format: OutputFormat) -> Result<()> {
    match cmd {
        IngestCommands::Load { roster, dry_run: true, .. } => cmd_dry_run(&roster, config, format).await,
        IngestCommands::Load { roster, dry_run: false, run } => {
            let store = super::connect(config).await?;
            cmd_load(&store, &roster, config, &run, format).await
        }
        IngestCommands::Relate { run } => {
            let store = super::connect(config).await?;
            cmd_relate(&store, config, &run, format).await
        }
        IngestCommands::Campaign { overlay, join, run } => {
            let store = super::connect(config).await?;
            cmd_campaign(&store, &overlay, join.into(), config, &run, format).await
        }
        IngestCommands::All { roster, overlay, join, run } => {
            let store = super::connect(config).await?;
            cmd_all(&store, &roster, overlay.as_deref(), join.into(), config, &run, format).await
        }
    }
}

/// Set a shared flag on Ctrl-C. The pipeline stops before its next batch.
fn cancel_on_interrupt() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancel
}

fn build_pipeline<'a>(store: &'a dyn CanvassStore, config: &CanvassConfig, run: &RunArgs) -> Result<Pipeline<'a>> {
    let mut pipeline = Pipeline::new(store, config.ingest.clone()).with_cancel_flag(cancel_on_interrupt());

    if let Some(path) = &run.checkpoint {
        if run.resume {
            if path.exists() {
                let checkpoint = Checkpoint::load(path)
                    .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
                info!(%checkpoint, "Resuming ingestion");
                pipeline = pipeline.resume_from(checkpoint);
            } else {
                warn!(path = %path.display(), "No checkpoint to resume from, starting over");
            }
        }
        pipeline = pipeline.with_checkpoint_file(path);
    }

    Ok(pipeline)
}

/// Attach a resume hint to errors that leave a usable checkpoint behind.
fn with_resume_hint(err: CanvassError, run: &RunArgs) -> anyhow::Error {
    match (&err, &run.checkpoint) {
        (CanvassError::Cancelled { .. } | CanvassError::BatchWrite { .. }, Some(path)) => {
            anyhow::Error::new(err).context(format!(
                "Progress saved to {}; rerun with --resume to continue",
                path.display()
            ))
        }
        (CanvassError::Cancelled { .. } | CanvassError::BatchWrite { .. }, None) => anyhow::Error::new(err)
            .context("Ingestion stopped; pass --checkpoint to make runs resumable"),
        _ => err.into(),
    }
}

fn read_roster(path: &Path, config: &CanvassConfig) -> Result<NormalizedRoster> {
    let rows = roster::read_roster(path).with_context(|| format!("Failed to read roster {}", path.display()))?;
    Ok(roster::normalize(rows, &config.roster))
}

fn read_overlay(path: &Path, join: OverlayJoin) -> Result<PreparedOverlay> {
    let rows = campaign::read_overlay(path, join)
        .with_context(|| format!("Failed to read overlay {}", path.display()))?;
    Ok(campaign::prepare_overlay(rows, join))
}

fn print_roster_summary(roster: &NormalizedRoster, format: OutputFormat) {
    if format == OutputFormat::Table {
        output::print_normalize_stats(&roster.stats, &roster.planned_nodes());
        println!();
    }
}

/// Normalize, load and relate into an in-memory graph, then report what a
/// real run would write.
async fn cmd_dry_run(path: &Path, config: &CanvassConfig, format: OutputFormat) -> Result<()> {
    let roster = read_roster(path, config)?;
    let store = MemoryStore::new();
    let run = RunArgs::default();

    let mut pipeline = build_pipeline(&store, config, &run)?;
    let mut report = pipeline.load(&roster).await.map_err(|e| with_resume_hint(e, &run))?;
    report.merge(pipeline.relate().await.map_err(|e| with_resume_hint(e, &run))?);
    let counts = store.counts().await?;

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "dry_run": true,
            "normalize": roster.stats,
            "planned": roster.planned_nodes(),
            "report": report,
            "counts": counts,
        })),
        OutputFormat::Table => {
            println!("{}", "Dry run: nothing was written to Neo4j".yellow().bold());
            println!();
            print_roster_summary(&roster, format);
            output::print_ingest_report(&report);
            println!();
            output::print_graph_counts(&counts);
            Ok(())
        }
    }
}

async fn cmd_load(
    store: &dyn CanvassStore,
    path: &Path,
    config: &CanvassConfig,
    run: &RunArgs,
    format: OutputFormat,
) -> Result<()> {
    let roster = read_roster(path, config)?;
    print_roster_summary(&roster, format);

    let mut pipeline = build_pipeline(store, config, run)?;
    let report = pipeline.load(&roster).await.map_err(|e| with_resume_hint(e, run))?;
    output::emit(format, &report, output::print_ingest_report)
}

async fn cmd_relate(store: &dyn CanvassStore, config: &CanvassConfig, run: &RunArgs, format: OutputFormat) -> Result<()> {
    let mut pipeline = build_pipeline(store, config, run)?;
    let report = pipeline.relate().await.map_err(|e| with_resume_hint(e, run))?;
    output::emit(format, &report, output::print_ingest_report)
}

async fn cmd_campaign(
    store: &dyn CanvassStore,
    path: &Path,
    join: OverlayJoin,
    config: &CanvassConfig,
    run: &RunArgs,
    format: OutputFormat,
) -> Result<()> {
    let overlay = read_overlay(path, join)?;
    let mut pipeline = build_pipeline(store, config, run)?;
    let report = pipeline
        .apply_overlay(&overlay, join)
        .await
        .map_err(|e| with_resume_hint(e, run))?;
    output::emit(format, &report, output::print_campaign_report)
}

async fn cmd_all(
    store: &dyn CanvassStore,
    roster_path: &Path,
    overlay_path: Option<&Path>,
    join: OverlayJoin,
    config: &CanvassConfig,
    run: &RunArgs,
    format: OutputFormat,
) -> Result<()> {
    let roster = read_roster(roster_path, config)?;
    // Fail on a bad overlay before anything is written.
    let overlay = overlay_path.map(|p| read_overlay(p, join)).transpose()?;
    print_roster_summary(&roster, format);

    let mut pipeline = build_pipeline(store, config, run)?;
    let mut report = pipeline.load(&roster).await.map_err(|e| with_resume_hint(e, run))?;
    report.merge(pipeline.relate().await.map_err(|e| with_resume_hint(e, run))?);

    let campaign = match &overlay {
        Some(overlay) => Some(
            pipeline
                .apply_overlay(overlay, join)
                .await
                .map_err(|e| with_resume_hint(e, run))?,
        ),
        None => None,
    };

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "normalize": roster.stats,
            "report": report,
            "campaign": campaign,
        })),
        OutputFormat::Table => {
            output::print_ingest_report(&report);
            if let Some(campaign) = &campaign {
                println!();
                output::print_campaign_report(campaign);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> IngestCommands {
        match Cli::try_parse_from(args.iter().copied()).unwrap().command {
            Commands::Ingest(cmd) => cmd,
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn test_resume_requires_checkpoint() {
        assert!(Cli::try_parse_from(["canvass", "ingest", "relate", "--resume"]).is_err());
        let cmd = parse(&["canvass", "ingest", "relate", "--checkpoint", "run.json", "--resume"]);
        match cmd {
            IngestCommands::Relate { run } => {
                assert!(run.resume);
                assert_eq!(run.checkpoint, Some(PathBuf::from("run.json")));
            }
            _ => panic!("expected relate"),
        }
    }

    #[test]
    fn test_campaign_join_defaults_to_national_no() {
        match parse(&["canvass", "ingest", "campaign", "overlay.csv"]) {
            IngestCommands::Campaign { join, .. } => {
                assert_eq!(OverlayJoin::from(join), OverlayJoin::NationalNo)
            }
            _ => panic!("expected campaign"),
        }
        match parse(&["canvass", "ingest", "campaign", "overlay.csv", "--join", "primary-key"]) {
            IngestCommands::Campaign { join, .. } => {
                assert_eq!(OverlayJoin::from(join), OverlayJoin::PrimaryKey)
            }
            _ => panic!("expected campaign"),
        }
    }

    #[test]
    fn test_resume_hint_names_checkpoint() {
        let run = RunArgs {
            checkpoint: Some(PathBuf::from("run.json")),
            resume: false,
        };
        let err = CanvassError::Cancelled {
            checkpoint: Checkpoint::start_of(canvass_core::ingest::Stage::Persons),
        };
        let message = format!("{:#}", with_resume_hint(err, &run));
        assert!(message.contains("run.json"));
        assert!(message.contains("--resume"));
    }

    #[tokio::test]
    async fn test_dry_run_pipeline_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        std::fs::write(
            &path,
            "national_no,first_name,father_name,grand_name,family_name,father_national_no,mother_national_no,dob,age,religion,address,circle,center,box\n\
             1000000001,Omar,Ali,Hasan,Haddad,1000000010,missing,,,,,Circle 1,School A,1\n\
             1000000002,Sara,Ali,Hasan,Haddad,1000000010,missing,,,,,Circle 1,School A,1\n",
        )
        .unwrap();

        let config = CanvassConfig::default();
        let roster = read_roster(&path, &config).unwrap();
        let store = MemoryStore::new();
        let run = RunArgs::default();
        let mut pipeline = build_pipeline(&store, &config, &run).unwrap();
        pipeline.load(&roster).await.unwrap();
        pipeline.relate().await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.persons, 3);
        assert_eq!(counts.placeholders, 1);
        assert_eq!(counts.relationship("FATHER"), 2);
        assert_eq!(counts.relationship("SIBLING"), 1);
        assert_eq!(counts.relationship("VOTES_AT"), 2);
    }
}
