//! Single-person influence: relatives aggregated by where they vote.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{percent, PersonSummary};

/// A person with their voting-location chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedProfile {
    pub person: PersonSummary,
    pub circle: Option<String>,
    pub center: Option<String>,
    #[serde(rename = "box")]
    pub box_name: Option<String>,
}

/// One relative reached from the seed, at its shortest distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeLocationRow {
    pub person: PersonSummary,
    pub distance: u32,
    pub circle: Option<String>,
    pub center: Option<String>,
    #[serde(rename = "box")]
    pub box_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub circle: String,
    /// Set on center-level rows only.
    pub center: Option<String>,
    pub num_relatives: u64,
    pub share_pct: f64,
}

/// Column lists of the three breakdown tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakdownColumns {
    pub relatives: &'static [&'static str],
    pub by_circle: &'static [&'static str],
    pub by_center: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfluenceBreakdown {
    pub columns: BreakdownColumns,
    pub seed: Option<SeedProfile>,
    pub relatives: Vec<RelativeLocationRow>,
    pub total_relatives: u64,
    pub by_circle: Vec<AggregateRow>,
    pub by_center: Vec<AggregateRow>,
    /// Relatives with no complete voting location.
    pub unlocated: u64,
    /// Voters registered anywhere in the graph. Every `share_pct` is a share
    /// of this total, not of a circle or center.
    pub graph_voters: u64,
}

impl InfluenceBreakdown {
    pub const COLUMNS: BreakdownColumns = BreakdownColumns {
        relatives: &["national_no", "name", "distance", "circle", "center", "box"],
        by_circle: &["circle", "num_relatives", "share_pct"],
        by_center: &["circle", "center", "num_relatives", "share_pct"],
    };

    /// Aggregate relatives by circle, then by circle and center. Shares are
    /// computed against `graph_voters`. Aggregates are ordered by count,
    /// descending, then by name.
    pub fn build(
        seed: Option<SeedProfile>,
        relatives: Vec<RelativeLocationRow>,
        graph_voters: u64,
    ) -> Self {
        let mut circles: BTreeMap<&str, u64> = BTreeMap::new();
        let mut centers: BTreeMap<(&str, &str), u64> = BTreeMap::new();
        let mut unlocated = 0u64;

        for row in &relatives {
            match (row.circle.as_deref(), row.center.as_deref()) {
                (Some(circle), Some(center)) => {
                    *circles.entry(circle).or_default() += 1;
                    *centers.entry((circle, center)).or_default() += 1;
                }
                _ => unlocated += 1,
            }
        }

        let mut by_circle: Vec<AggregateRow> = circles
            .into_iter()
            .map(|(circle, n)| AggregateRow {
                circle: circle.to_string(),
                center: None,
                num_relatives: n,
                share_pct: percent(n, graph_voters),
            })
            .collect();
        let mut by_center: Vec<AggregateRow> = centers
            .into_iter()
            .map(|((circle, center), n)| AggregateRow {
                circle: circle.to_string(),
                center: Some(center.to_string()),
                num_relatives: n,
                share_pct: percent(n, graph_voters),
            })
            .collect();
        // BTreeMap order is by name; a stable sort keeps it among equal counts.
        by_circle.sort_by(|a, b| b.num_relatives.cmp(&a.num_relatives));
        by_center.sort_by(|a, b| b.num_relatives.cmp(&a.num_relatives));

        Self {
            columns: Self::COLUMNS,
            seed,
            total_relatives: relatives.len() as u64,
            relatives,
            by_circle,
            by_center,
            unlocated,
            graph_voters,
        }
    }
}
