//! Result shaping: raw query rows into tables, aggregates and graph views.
//!
//! Shaped outputs carry static column lists, so empty inputs still render
//! with the right headers.

pub mod celf;
pub mod graph_view;
pub mod influence;
pub mod ranking;

use serde::{Deserialize, Serialize};

pub use celf::{rank_by_spread, InfluenceRank, SpreadRow};
pub use graph_view::{GraphView, NodeKind, RawEdgeRow, RawNode, ViewEdge, ViewNode};
pub use influence::{AggregateRow, BreakdownColumns, InfluenceBreakdown, RelativeLocationRow, SeedProfile};
pub use ranking::{RankedRow, RankedTable, RelativeCountRow};

/// A picker entry: a location name and its graph element id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOption {
    pub id: String,
    pub name: String,
}

/// Population totals within a location scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCounts {
    pub num_centers: u64,
    pub num_boxes: u64,
    pub num_voters: u64,
}

/// The person columns every person-returning query yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub national_no: String,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub father_name: Option<String>,
    pub grand_name: Option<String>,
    pub family_name: Option<String>,
    pub phone_number: Option<String>,
    pub primary_key: Option<String>,
    pub synthetic: bool,
}

impl PersonSummary {
    pub fn new(national_no: impl Into<String>) -> Self {
        Self {
            national_no: national_no.into(),
            ..Default::default()
        }
    }

    /// Full name, else the joined name parts, else the identity key.
    pub fn display_name(&self) -> String {
        if let Some(full) = &self.full_name {
            return full.clone();
        }
        let parts: Vec<&str> = [
            &self.first_name,
            &self.father_name,
            &self.grand_name,
            &self.family_name,
        ]
        .iter()
        .filter_map(|p| p.as_deref())
        .collect();
        if parts.is_empty() {
            self.national_no.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// `part / whole` as a percentage rounded to two places. Zero when `whole` is zero.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_zero_denominator() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 3), 33.33);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut p = PersonSummary::new("1000000001");
        assert_eq!(p.display_name(), "1000000001");
        p.first_name = Some("Omar".into());
        p.family_name = Some("Haddad".into());
        assert_eq!(p.display_name(), "Omar Haddad");
        p.full_name = Some("Omar Ali Haddad".into());
        assert_eq!(p.display_name(), "Omar Ali Haddad");
    }
}
