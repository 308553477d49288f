//! Ranked table of persons by distinct-relative count.

use serde::{Deserialize, Serialize};

use super::{percent, PersonSummary};

/// One row of the relative-count query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeCountRow {
    pub person: PersonSummary,
    pub num_relatives: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub rank: usize,
    pub national_no: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub primary_key: Option<String>,
    pub num_relatives: u64,
    pub influence_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTable {
    pub columns: &'static [&'static str],
    pub rows: Vec<RankedRow>,
    /// Voter total the influence percentage is computed against.
    pub denominator: u64,
}

impl RankedTable {
    pub const COLUMNS: &'static [&'static str] = &[
        "rank",
        "national_no",
        "name",
        "phone_number",
        "primary_key",
        "num_relatives",
        "influence_pct",
    ];

    /// Sort by relative count, descending, keeping input order among ties,
    /// and keep the first `top_n`.
    pub fn build(mut rows: Vec<RelativeCountRow>, top_n: usize, denominator: u64) -> Self {
        rows.sort_by(|a, b| b.num_relatives.cmp(&a.num_relatives));
        let rows = rows
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(i, row)| RankedRow {
                rank: i + 1,
                name: row.person.display_name(),
                national_no: row.person.national_no,
                phone_number: row.person.phone_number,
                primary_key: row.person.primary_key,
                num_relatives: row.num_relatives,
                influence_pct: percent(row.num_relatives, denominator),
            })
            .collect();

        Self {
            columns: Self::COLUMNS,
            rows,
            denominator,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
