//! Pipeline and traversal properties, run against the in-memory store.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use canvass_core::campaign::{prepare_overlay, OverlayJoin, RawOverlayRow};
use canvass_core::config::IngestConfig;
use canvass_core::ingest::{Checkpoint, Stage};
use canvass_core::query::{InfluenceFilter, LocationScope, Relationship, TraversalFilter};
use canvass_core::roster::{normalize, NormalizedRoster, PollingLocation, RawRosterRow, RosterFilter};
use canvass_core::CanvassError;
use canvass_graph::queries;
use canvass_graph::{CanvassStore, MemoryStore, Pipeline};

fn person(key: &str, father: Option<&str>, mother: Option<&str>, box_name: &str) -> RawRosterRow {
    RawRosterRow {
        national_no: Some(key.into()),
        first_name: Some(format!("P{}", &key[key.len() - 2..])),
        family_name: Some("Haddad".into()),
        father_national_no: Some(father.unwrap_or("missing").into()),
        mother_national_no: Some(mother.unwrap_or("missing").into()),
        circle: Some("Circle 1".into()),
        center: Some("School A".into()),
        box_name: Some(box_name.into()),
        ..Default::default()
    }
}

fn roster(rows: Vec<RawRosterRow>) -> NormalizedRoster {
    normalize(rows, &RosterFilter::default())
}

fn small_batches() -> IngestConfig {
    IngestConfig {
        node_batch_size: 2,
        link_batch_size: 2,
        max_retries: 2,
        retry_backoff_ms: 1,
        batch_timeout_secs: 5,
    }
}

async fn ingest(store: &MemoryStore, roster: &NormalizedRoster) {
    let mut pipeline = Pipeline::new(store, small_batches());
    pipeline.load(roster).await.unwrap();
    pipeline.relate().await.unwrap();
}

/// Father F, mother M, children A, B, C; grandfather G of F.
fn family_roster() -> NormalizedRoster {
    roster(vec![
        person("1000000001", Some("1000000010"), Some("1000000020"), "1"),
        person("1000000002", Some("1000000010"), Some("1000000020"), "1"),
        person("1000000003", Some("1000000010"), Some("1000000020"), "2"),
        person("1000000010", Some("1000000099"), None, "1"),
        person("1000000020", None, None, "1"),
        person("1000000099", None, None, "1"),
    ])
}

fn box_scope(name: &str) -> LocationScope {
    LocationScope::Box(MemoryStore::box_element_id(&PollingLocation {
        circle: "Circle 1".into(),
        center: "School A".into(),
        box_name: name.into(),
    }))
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = MemoryStore::new();
    let roster = family_roster();

    ingest(&store, &roster).await;
    let once = store.counts().await.unwrap();
    ingest(&store, &roster).await;
    let twice = store.counts().await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.persons, 6);
    assert_eq!(once.boxes, 2);
}

#[tokio::test]
async fn test_second_run_creates_no_relationships() {
    let store = MemoryStore::new();
    let roster = family_roster();
    ingest(&store, &roster).await;

    let mut pipeline = Pipeline::new(&store, small_batches());
    let report = pipeline.relate().await.unwrap();
    for stage in Stage::LINK {
        assert_eq!(report.written(stage), 0, "{stage}");
    }
}

/// `families` households of father, mother and two children spread over 25 boxes.
fn household_roster(families: u32) -> NormalizedRoster {
    let mut rows = Vec::new();
    for n in 0..families {
        let father = format!("1{:06}100", n);
        let mother = format!("1{:06}200", n);
        let box_name = (n % 25).to_string();
        rows.push(person(&father, None, None, &box_name));
        rows.push(person(&mother, None, None, &box_name));
        for child in ["001", "002"] {
            rows.push(person(&format!("1{:06}{}", n, child), Some(&father), Some(&mother), &box_name));
        }
    }
    roster(rows)
}

#[tokio::test]
async fn test_large_roster_dry_run_stays_fast() {
    let families = 5_000;
    let roster = household_roster(families);
    let store = MemoryStore::new();

    let started = Instant::now();
    let mut pipeline = Pipeline::new(&store, IngestConfig::default());
    pipeline.load(&roster).await.unwrap();
    pipeline.relate().await.unwrap();
    let filter = TraversalFilter::new(box_scope("7"), Relationship::ALL, 3).unwrap();
    let table = queries::relative_ranks(&store, &filter, 20).await.unwrap();
    let elapsed = started.elapsed();

    let counts = store.counts().await.unwrap();
    let families = u64::from(families);
    assert_eq!(counts.persons, 4 * families);
    assert_eq!(counts.relationship("FATHER"), 2 * families);
    assert_eq!(counts.relationship("MOTHER"), 2 * families);
    assert_eq!(counts.relationship("SPOUSE"), families);
    assert_eq!(counts.relationship("SIBLING"), families);
    assert_eq!(counts.relationship("VOTES_AT"), 4 * families);
    assert_eq!(table.rows.len(), 20);
    assert!(elapsed < Duration::from_secs(10), "dry run took {elapsed:?}");
}

#[tokio::test]
async fn test_co_parents_become_spouses_once() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    assert!(store.has_relationship("SPOUSE", "1000000010", "1000000020"));
    assert!(!store.has_relationship("SPOUSE", "1000000020", "1000000010"));
    let counts = store.counts().await.unwrap();
    assert_eq!(counts.relationship("SPOUSE"), 1);
}

#[tokio::test]
async fn test_siblings_linked_once_from_greater_key() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    assert!(store.has_relationship("SIBLING", "1000000002", "1000000001"));
    assert!(store.has_relationship("SIBLING", "1000000003", "1000000001"));
    assert!(store.has_relationship("SIBLING", "1000000003", "1000000002"));
    assert!(!store.has_relationship("SIBLING", "1000000001", "1000000002"));
    assert_eq!(store.counts().await.unwrap().relationship("SIBLING"), 3);
}

#[tokio::test]
async fn test_sibling_count_independent_of_insertion_order() {
    let forward = MemoryStore::new();
    ingest(&forward, &family_roster()).await;

    let mut rows = vec![
        person("1000000099", None, None, "1"),
        person("1000000020", None, None, "1"),
        person("1000000010", Some("1000000099"), None, "1"),
        person("1000000003", Some("1000000010"), Some("1000000020"), "2"),
        person("1000000002", Some("1000000010"), Some("1000000020"), "1"),
        person("1000000001", Some("1000000010"), Some("1000000020"), "1"),
    ];
    rows.reverse();
    let reversed = MemoryStore::new();
    ingest(&reversed, &roster(rows)).await;

    assert_eq!(forward.counts().await.unwrap(), reversed.counts().await.unwrap());
}

#[tokio::test]
async fn test_present_parent_needs_no_placeholder() {
    let store = MemoryStore::new();
    ingest(
        &store,
        &roster(vec![
            person("1000000001", Some("1000000002"), None, "1"),
            person("1000000002", None, None, "1"),
        ]),
    )
    .await;

    assert!(store.has_relationship("FATHER", "1000000002", "1000000001"));
    assert_eq!(store.is_synthetic("1000000002"), Some(false));
    assert_eq!(store.counts().await.unwrap().placeholders, 0);
}

#[tokio::test]
async fn test_absent_parent_gets_placeholder() {
    let store = MemoryStore::new();
    let mut pipeline = Pipeline::new(&store, small_batches());
    let report = pipeline
        .load(&roster(vec![person("1000000001", Some("1000000009"), None, "1")]))
        .await
        .unwrap();
    pipeline.relate().await.unwrap();

    assert_eq!(report.written(Stage::Placeholders), 1);
    assert_eq!(store.is_synthetic("1000000009"), Some(true));
    assert!(store.has_relationship("FATHER", "1000000009", "1000000001"));
    let placeholder = store.person_record("1000000009").unwrap();
    assert_eq!(placeholder.first_name, None);
    assert_eq!(placeholder.box_name, None);
}

#[tokio::test]
async fn test_later_roster_row_upgrades_placeholder() {
    let store = MemoryStore::new();
    ingest(&store, &roster(vec![person("1000000001", Some("1000000009"), None, "1")])).await;
    assert_eq!(store.is_synthetic("1000000009"), Some(true));

    ingest(
        &store,
        &roster(vec![
            person("1000000001", Some("1000000009"), None, "1"),
            person("1000000009", None, None, "1"),
        ]),
    )
    .await;
    assert_eq!(store.is_synthetic("1000000009"), Some(false));
    assert_eq!(store.counts().await.unwrap().persons, 2);
}

#[tokio::test]
async fn test_overlay_updates_existing_and_drops_unknown() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;
    let before = store.counts().await.unwrap();

    let overlay = prepare_overlay(
        vec![
            RawOverlayRow {
                national_no: Some("1000000001".into()),
                phone_number: Some("0790000001".into()),
                voter_type: Some("core".into()),
                ..Default::default()
            },
            RawOverlayRow {
                national_no: Some("5555555555".into()),
                phone_number: Some("0790000002".into()),
                ..Default::default()
            },
        ],
        OverlayJoin::NationalNo,
    );
    let mut pipeline = Pipeline::new(&store, small_batches());
    let report = pipeline.apply_overlay(&overlay, OverlayJoin::NationalNo).await.unwrap();

    assert_eq!(report.matched, 1);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.unmatched_sample, vec!["5555555555".to_string()]);
    assert_eq!(store.counts().await.unwrap(), before);
    assert!(store.person_record("5555555555").is_none());

    let fields = store.campaign_fields("1000000001").unwrap();
    assert_eq!(fields.phone_number.as_deref(), Some("0790000001"));
    assert_eq!(fields.voter_type.as_deref(), Some("core"));
}

#[tokio::test]
async fn test_reload_keeps_campaign_fields() {
    let store = MemoryStore::new();
    let roster = family_roster();
    ingest(&store, &roster).await;

    let overlay = prepare_overlay(
        vec![RawOverlayRow {
            national_no: Some("1000000002".into()),
            credibility: Some("high".into()),
            ..Default::default()
        }],
        OverlayJoin::NationalNo,
    );
    Pipeline::new(&store, small_batches())
        .apply_overlay(&overlay, OverlayJoin::NationalNo)
        .await
        .unwrap();
    ingest(&store, &roster).await;

    let fields = store.campaign_fields("1000000002").unwrap();
    assert_eq!(fields.credibility.as_deref(), Some("high"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = MemoryStore::new();
    store.fail_next_writes(2);
    let mut pipeline = Pipeline::new(&store, small_batches());
    pipeline.load(&family_roster()).await.unwrap();
    assert_eq!(store.counts().await.unwrap().persons, 6);
}

#[tokio::test]
async fn test_exhausted_retries_report_resume_context() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let mut pipeline = Pipeline::new(&store, small_batches()).resume_from(Checkpoint::start_of(Stage::Sibling));
    store.fail_next_writes(3);
    let err = pipeline.relate().await.unwrap_err();
    match err {
        CanvassError::BatchWrite {
            stage,
            offset,
            attempts,
            ..
        } => {
            assert_eq!(stage, Stage::Sibling);
            assert_eq!(offset, 0);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected BatchWrite, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_then_resume_completes() {
    let store = MemoryStore::new();
    let roster = family_roster();
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("checkpoint.json");

    let mut pipeline = Pipeline::new(&store, small_batches()).with_checkpoint_file(&checkpoint_path);
    pipeline.load(&roster).await.unwrap();
    pipeline.cancel_handle().store(true, Ordering::SeqCst);
    let err = pipeline.relate().await.unwrap_err();
    let CanvassError::Cancelled { checkpoint } = err else {
        panic!("expected cancellation, got {err:?}");
    };
    assert_eq!(checkpoint.stage, Stage::Father);
    assert_eq!(pipeline.position(), &checkpoint);
    assert_eq!(store.counts().await.unwrap().relationship("FATHER"), 0);

    let saved = Checkpoint::load(&checkpoint_path).unwrap();
    assert_eq!(saved.stage, Stage::Placeholders);

    let mut resumed = Pipeline::new(&store, small_batches()).resume_from(saved);
    let report = resumed.relate().await.unwrap();
    assert!(report.stages.iter().all(|s| !s.skipped));

    let reference = MemoryStore::new();
    ingest(&reference, &roster).await;
    assert_eq!(store.counts().await.unwrap(), reference.counts().await.unwrap());
}

#[tokio::test]
async fn test_resume_skips_completed_stages() {
    let store = MemoryStore::new();
    let mut pipeline = Pipeline::new(&store, small_batches()).resume_from(Checkpoint::start_of(Stage::Placeholders));
    let report = pipeline.load(&family_roster()).await.unwrap();

    assert!(report.stage(Stage::Locations).unwrap().skipped);
    assert!(report.stage(Stage::Persons).unwrap().skipped);
    assert_eq!(store.counts().await.unwrap().persons, 0);
}

#[tokio::test]
async fn test_father_depth_one_is_direct_hops_only() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = TraversalFilter::new(box_scope("1"), [Relationship::Father], 1).unwrap();
    let rows = store.relative_counts(&filter, 10).await.unwrap();
    // F reaches children 1 and 2 in box 1; G reaches only F.
    let counts: Vec<(&str, u64)> = rows
        .iter()
        .map(|r| (r.person.national_no.as_str(), r.num_relatives))
        .collect();
    assert_eq!(counts, vec![("1000000010", 2), ("1000000099", 1)]);
}

#[tokio::test]
async fn test_father_depth_two_includes_grandchildren() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = TraversalFilter::new(box_scope("1"), [Relationship::Father], 2).unwrap();
    let rows = store.relative_counts(&filter, 10).await.unwrap();
    let grandfather = rows.iter().find(|r| r.person.national_no == "1000000099").unwrap();
    // F, plus grandchildren 1 and 2 (3 votes elsewhere).
    assert_eq!(grandfather.num_relatives, 3);
}

#[tokio::test]
async fn test_relative_ranks_table() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = TraversalFilter::new(box_scope("1"), Relationship::ALL, 1).unwrap();
    let table = queries::relative_ranks(&store, &filter, 3).await.unwrap();
    assert!(table.rows.len() <= 3);
    assert_eq!(table.denominator, 5);
    assert_eq!(table.rows[0].rank, 1);
    assert!(table.rows.windows(2).all(|w| w[0].num_relatives >= w[1].num_relatives));
}

#[tokio::test]
async fn test_empty_scope_shapes_to_empty_table() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = TraversalFilter::new(LocationScope::Box("box:nowhere".into()), Relationship::ALL, 3).unwrap();
    let table = queries::relative_ranks(&store, &filter, 10).await.unwrap();
    assert!(table.rows.is_empty());
    assert_eq!(table.denominator, 0);
    assert!(!table.columns.is_empty());
}

#[tokio::test]
async fn test_person_influence_breakdown() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = InfluenceFilter::new("1000000010", [Relationship::Father], 1).unwrap();
    let breakdown = queries::person_influence(&store, &filter).await.unwrap();
    let seed = breakdown.seed.as_ref().unwrap();
    assert_eq!(seed.box_name.as_deref(), Some("1"));
    assert_eq!(breakdown.total_relatives, 3);
    assert_eq!(breakdown.by_circle.len(), 1);
    assert_eq!(breakdown.by_circle[0].num_relatives, 3);
    assert_eq!(breakdown.graph_voters, 6);
    assert_eq!(breakdown.by_circle[0].share_pct, 50.0);
}

#[tokio::test]
async fn test_unknown_person_yields_empty_breakdown() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = InfluenceFilter::new("4444444444", Relationship::ALL, 2).unwrap();
    let breakdown = queries::person_influence(&store, &filter).await.unwrap();
    assert!(breakdown.seed.is_none());
    assert!(breakdown.by_circle.is_empty());
}

#[tokio::test]
async fn test_family_view_includes_votes_edges() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let filter = InfluenceFilter::new("1000000010", [Relationship::Father, Relationship::Spouse], 1).unwrap();
    let view = queries::family_view(&store, &filter, 100).await.unwrap();
    let fathers = view.edges.iter().filter(|e| e.rel_type == "FATHER").count();
    let spouses = view.edges.iter().filter(|e| e.rel_type == "SPOUSE").count();
    let votes = view.edges.iter().filter(|e| e.rel_type == "VOTES_AT").count();
    assert_eq!(fathers, 3);
    assert_eq!(spouses, 1);
    // Seed, three children and the spouse all vote.
    assert_eq!(votes, 5);
    assert_eq!(view.nodes.iter().filter(|n| n.is_seed).count(), 1);
}

#[tokio::test]
async fn test_location_pickers_and_counts() {
    let store = MemoryStore::new();
    ingest(&store, &family_roster()).await;

    let circles = queries::circles(&store).await.unwrap();
    assert_eq!(circles.len(), 1);
    let centers = queries::centers(&store, &circles[0].id).await.unwrap();
    assert_eq!(centers.len(), 1);
    let boxes = queries::boxes(&store, &circles[0].id, &centers[0].id).await.unwrap();
    assert_eq!(boxes.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);

    let counts = queries::location_counts(&store, &LocationScope::Circle(circles[0].id.clone()))
        .await
        .unwrap();
    assert_eq!((counts.num_centers, counts.num_boxes, counts.num_voters), (1, 2, 6));
}

#[tokio::test]
async fn test_celf_requires_graph_engine() {
    let store = MemoryStore::new();
    let err = queries::influence_ranking(
        &store,
        &box_scope("1"),
        &canvass_core::query::RelationshipSet::all(),
        &Default::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CanvassError::Unsupported(_)));
}
