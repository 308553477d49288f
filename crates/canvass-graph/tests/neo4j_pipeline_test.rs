//! End-to-end ingestion and traversal against a real Neo4j.
//!
//! Requirements: Docker (for Neo4j via testcontainers)
//!
//! Run with: cargo test -p canvass-graph --features test-utils --test neo4j_pipeline_test

#![cfg(feature = "test-utils")]

use canvass_core::campaign::{prepare_overlay, OverlayJoin, RawOverlayRow};
use canvass_core::config::IngestConfig;
use canvass_core::query::{InfluenceFilter, LocationScope, Relationship, TraversalFilter};
use canvass_core::roster::{normalize, NormalizedRoster, RawRosterRow, RosterFilter};
use canvass_graph::{queries, CanvassStore, Neo4jStore, Pipeline};

fn person(key: &str, father: &str, mother: &str, box_name: &str) -> RawRosterRow {
    RawRosterRow {
        national_no: Some(key.into()),
        first_name: Some("Test".into()),
        father_national_no: Some(father.into()),
        mother_national_no: Some(mother.into()),
        circle: Some("Circle 1".into()),
        center: Some("School A".into()),
        box_name: Some(box_name.into()),
        ..Default::default()
    }
}

fn small_batches() -> IngestConfig {
    IngestConfig {
        node_batch_size: 2,
        link_batch_size: 2,
        ..Default::default()
    }
}

async fn ingest(store: &Neo4jStore, roster: &NormalizedRoster) {
    let mut pipeline = Pipeline::new(store, small_batches());
    pipeline.load(roster).await.unwrap();
    pipeline.relate().await.unwrap();
}

async fn phone(store: &Neo4jStore, key: &str) -> Option<String> {
    store.person(key).await.unwrap().unwrap().person.phone_number
}

#[tokio::test]
async fn test_pipeline_against_neo4j() {
    let (_container, store) = canvass_graph::testutil::neo4j_container().await;

    let roster = normalize(
        vec![
            person("1000000001", "1000000010", "1000000020", "1"),
            person("1000000002", "1000000010", "1000000020", "1"),
            person("1000000010", "1000000099", "missing", "1"),
            person("1000000020", "missing", "missing", "1"),
        ],
        &RosterFilter::default(),
    );
    let config = IngestConfig {
        node_batch_size: 2,
        link_batch_size: 2,
        ..Default::default()
    };

    for _ in 0..2 {
        let mut pipeline = Pipeline::new(&store, config.clone());
        pipeline.load(&roster).await.unwrap();
        pipeline.relate().await.unwrap();
    }

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.persons, 5);
    assert_eq!(counts.placeholders, 1);
    assert_eq!(counts.relationship("FATHER"), 3);
    assert_eq!(counts.relationship("MOTHER"), 2);
    assert_eq!(counts.relationship("SPOUSE"), 1);
    assert_eq!(counts.relationship("SIBLING"), 1);
    assert_eq!(counts.relationship("VOTES_AT"), 4);

    let circles = queries::circles(&store).await.unwrap();
    let centers = queries::centers(&store, &circles[0].id).await.unwrap();
    let boxes = queries::boxes(&store, &circles[0].id, &centers[0].id).await.unwrap();

    let filter = TraversalFilter::new(LocationScope::Box(boxes[0].id.clone()), [Relationship::Father], 1).unwrap();
    let table = queries::relative_ranks(&store, &filter, 10).await.unwrap();
    assert_eq!(table.rows[0].national_no, "1000000010");
    assert_eq!(table.rows[0].num_relatives, 2);

    let influence = InfluenceFilter::new("1000000099", [Relationship::Father], 2).unwrap();
    let breakdown = queries::person_influence(&store, &influence).await.unwrap();
    assert_eq!(breakdown.total_relatives, 3);
}

/// Grandfather G, father F, mother M; children A and B vote at box 1, C at box 2.
fn three_generations() -> NormalizedRoster {
    normalize(
        vec![
            person("1000000099", "missing", "missing", "1"),
            person("1000000010", "1000000099", "missing", "1"),
            person("1000000020", "missing", "missing", "1"),
            person("1000000001", "1000000010", "1000000020", "1"),
            person("1000000002", "1000000010", "1000000020", "1"),
            person("1000000003", "1000000010", "1000000020", "2"),
        ],
        &RosterFilter::default(),
    )
}

#[tokio::test]
async fn test_traversal_bounds_and_family_view_against_neo4j() {
    let (_container, store) = canvass_graph::testutil::neo4j_container().await;
    ingest(&store, &three_generations()).await;

    let circles = queries::circles(&store).await.unwrap();
    let centers = queries::centers(&store, &circles[0].id).await.unwrap();
    let boxes = queries::boxes(&store, &circles[0].id, &centers[0].id).await.unwrap();
    assert_eq!(boxes.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
    let box_one = LocationScope::Box(boxes[0].id.clone());

    // Depth 1: direct FATHER hops only.
    let filter = TraversalFilter::new(box_one.clone(), [Relationship::Father], 1).unwrap();
    let table = queries::relative_ranks(&store, &filter, 10).await.unwrap();
    let ranked: Vec<(&str, u64)> = table.rows.iter().map(|r| (r.national_no.as_str(), r.num_relatives)).collect();
    assert_eq!(ranked, vec![("1000000010", 2), ("1000000099", 1)]);
    assert_eq!(table.denominator, 5);

    // Depth 2 adds FATHER-of-FATHER chains.
    let filter = TraversalFilter::new(box_one, [Relationship::Father], 2).unwrap();
    let table = queries::relative_ranks(&store, &filter, 10).await.unwrap();
    assert_eq!(table.rows[0].national_no, "1000000099");
    assert_eq!(table.rows[0].num_relatives, 3);

    let shallow = InfluenceFilter::new("1000000099", [Relationship::Father], 1).unwrap();
    assert_eq!(queries::person_influence(&store, &shallow).await.unwrap().total_relatives, 1);
    let deep = InfluenceFilter::new("1000000099", [Relationship::Father], 2).unwrap();
    let breakdown = queries::person_influence(&store, &deep).await.unwrap();
    assert_eq!(breakdown.total_relatives, 4);
    assert_eq!(breakdown.graph_voters, 6);
    assert_eq!(breakdown.by_center[0].num_relatives, 4);

    let view_filter = InfluenceFilter::new("1000000010", [Relationship::Father, Relationship::Spouse], 1).unwrap();
    let view = queries::family_view(&store, &view_filter, 100).await.unwrap();
    let count = |rel: &str| view.edges.iter().filter(|e| e.rel_type == rel).count();
    assert_eq!(count("FATHER"), 3);
    assert_eq!(count("SPOUSE"), 1);
    assert_eq!(count("MOTHER"), 0);
    // Seed, three children and the spouse all vote.
    assert_eq!(count("VOTES_AT"), 5);
    assert_eq!(view.nodes.iter().filter(|n| n.is_seed).count(), 1);
}

#[tokio::test]
async fn test_empty_results_against_neo4j() {
    let (_container, store) = canvass_graph::testutil::neo4j_container().await;
    ingest(&store, &three_generations()).await;

    let nowhere = LocationScope::Box("4:00000000-0000-0000-0000-000000000000:999999".into());
    let filter = TraversalFilter::new(nowhere.clone(), Relationship::ALL, 3).unwrap();
    let table = queries::relative_ranks(&store, &filter, 10).await.unwrap();
    assert!(table.is_empty());
    assert!(!table.columns.is_empty());
    assert_eq!(table.denominator, 0);

    let counts = queries::location_counts(&store, &nowhere).await.unwrap();
    assert_eq!((counts.num_centers, counts.num_boxes, counts.num_voters), (0, 0, 0));

    let unknown = InfluenceFilter::new("4444444444", Relationship::ALL, 2).unwrap();
    let breakdown = queries::person_influence(&store, &unknown).await.unwrap();
    assert!(breakdown.seed.is_none());
    assert!(breakdown.by_circle.is_empty());
    assert!(queries::family_view(&store, &unknown, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_placeholder_upgrade_and_overlay_against_neo4j() {
    let (_container, store) = canvass_graph::testutil::neo4j_container().await;
    let child = RawRosterRow {
        primary_key: Some("PK-01".into()),
        ..person("1000000001", "1000000009", "missing", "1")
    };
    let parent = RawRosterRow {
        primary_key: Some("PK-09".into()),
        ..person("1000000009", "missing", "missing", "1")
    };

    ingest(&store, &normalize(vec![child.clone()], &RosterFilter::default())).await;
    assert!(store.person("1000000009").await.unwrap().unwrap().person.synthetic);
    assert_eq!(store.counts().await.unwrap().placeholders, 1);

    let full = normalize(vec![child, parent], &RosterFilter::default());
    ingest(&store, &full).await;
    assert!(!store.person("1000000009").await.unwrap().unwrap().person.synthetic);
    let before = store.counts().await.unwrap();
    assert_eq!((before.persons, before.placeholders), (2, 0));
    assert_eq!(before.relationship("FATHER"), 1);

    let by_national_no = prepare_overlay(
        vec![
            RawOverlayRow {
                national_no: Some("1000000001".into()),
                phone_number: Some("0790000001".into()),
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
    let report = Pipeline::new(&store, small_batches())
        .apply_overlay(&by_national_no, OverlayJoin::NationalNo)
        .await
        .unwrap();
    assert_eq!((report.matched, report.unmatched), (1, 1));
    assert_eq!(report.unmatched_sample, vec!["5555555555".to_string()]);

    let by_primary_key = prepare_overlay(
        vec![
            RawOverlayRow {
                primary_key: Some("PK-09".into()),
                phone_number: Some("0790000009".into()),
                ..Default::default()
            },
            RawOverlayRow {
                primary_key: Some("PK-404".into()),
                phone_number: Some("0790000404".into()),
                ..Default::default()
            },
        ],
        OverlayJoin::PrimaryKey,
    );
    let report = Pipeline::new(&store, small_batches())
        .apply_overlay(&by_primary_key, OverlayJoin::PrimaryKey)
        .await
        .unwrap();
    assert_eq!((report.matched, report.unmatched), (1, 1));
    assert_eq!(report.unmatched_sample, vec!["PK-404".to_string()]);

    assert_eq!(store.counts().await.unwrap(), before);
    assert!(store.person("5555555555").await.unwrap().is_none());
    assert_eq!(phone(&store, "1000000001").await.as_deref(), Some("0790000001"));
    assert_eq!(phone(&store, "1000000009").await.as_deref(), Some("0790000009"));

    // A roster reload leaves campaign fields alone.
    ingest(&store, &full).await;
    assert_eq!(phone(&store, "1000000001").await.as_deref(), Some("0790000001"));
    assert_eq!(phone(&store, "1000000009").await.as_deref(), Some("0790000009"));
    assert_eq!(store.counts().await.unwrap(), before);
}
