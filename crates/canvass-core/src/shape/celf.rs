//! CELF influence-maximization results.

use serde::{Deserialize, Serialize};

use super::PersonSummary;

/// One streamed CELF seed with its spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadRow {
    pub person: PersonSummary,
    pub spread: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfluenceRank {
    pub rank: usize,
    pub national_no: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub spread: f64,
}

impl InfluenceRank {
    pub const COLUMNS: &'static [&'static str] =
        &["rank", "national_no", "name", "phone_number", "spread"];
}

/// Rank seeds by spread, descending. Non-finite spreads sort last.
pub fn rank_by_spread(mut rows: Vec<SpreadRow>) -> Vec<InfluenceRank> {
    rows.sort_by(|a, b| {
        let key = |s: f64| if s.is_finite() { s } else { f64::NEG_INFINITY };
        key(b.spread).total_cmp(&key(a.spread))
    });
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| InfluenceRank {
            rank: i + 1,
            name: row.person.display_name(),
            national_no: row.person.national_no,
            phone_number: row.person.phone_number,
            spread: row.spread,
        })
        .collect()
}
