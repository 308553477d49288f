//! Roster normalization: canonical-row filter, dedupe by identity key, and
//! detection of parents referenced but absent from the roster.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::model::{PersonRecord, PollingLocation, RawRosterRow};

/// Configurable row predicate and identifier shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterFilter {
    /// Drop rows flagged as non-unique names or unmatched records.
    pub require_unique_name: bool,
    /// Exact digit count of a well-formed identity key. Parent references
    /// of any other shape are treated as corrupted.
    pub identity_key_digits: usize,
}

impl Default for RosterFilter {
    fn default() -> Self {
        Self {
            require_unique_name: true,
            identity_key_digits: 10,
        }
    }
}

impl RosterFilter {
    pub fn is_identity_key(&self, key: &str) -> bool {
        key.len() == self.identity_key_digits && key.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Counters reported after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub rows_read: usize,
    pub rejected_non_canonical: usize,
    pub missing_identity: usize,
    pub duplicates: usize,
    pub malformed_parent_refs: usize,
}

/// Node totals the loader is about to write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlannedNodes {
    pub persons: usize,
    pub placeholders: usize,
    pub circles: usize,
    pub centers: usize,
    pub boxes: usize,
}

impl PlannedNodes {
    pub fn total(&self) -> usize {
        self.persons + self.placeholders + self.circles + self.centers + self.boxes
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedRoster {
    /// Exactly one record per identity key, in first-seen order.
    pub persons: Vec<PersonRecord>,
    pub missing_fathers: BTreeSet<String>,
    pub missing_mothers: BTreeSet<String>,
    /// Distinct complete locations, sorted.
    pub locations: Vec<PollingLocation>,
    pub stats: NormalizeStats,
}

impl NormalizedRoster {
    /// Identity keys needing a placeholder Person, fathers and mothers merged.
    pub fn placeholder_keys(&self) -> Vec<String> {
        self.missing_fathers
            .union(&self.missing_mothers)
            .cloned()
            .collect()
    }

    pub fn planned_nodes(&self) -> PlannedNodes {
        let circles: HashSet<&str> = self.locations.iter().map(|l| l.circle.as_str()).collect();
        let centers: HashSet<(&str, &str)> = self
            .locations
            .iter()
            .map(|l| (l.center.as_str(), l.circle.as_str()))
            .collect();

        PlannedNodes {
            persons: self.persons.len(),
            placeholders: self.placeholder_keys().len(),
            circles: circles.len(),
            centers: centers.len(),
            boxes: self.locations.len(),
        }
    }
}

/// Normalize raw roster rows. Pure; never fails once the columns are valid.
pub fn normalize(rows: Vec<RawRosterRow>, filter: &RosterFilter) -> NormalizedRoster {
    let mut stats = NormalizeStats {
        rows_read: rows.len(),
        ..Default::default()
    };

    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    let mut persons = Vec::with_capacity(rows.len());

    for row in rows {
        if filter.require_unique_name && !row.is_canonical() {
            stats.rejected_non_canonical += 1;
            continue;
        }
        let Some(record) = row.into_record() else {
            stats.missing_identity += 1;
            continue;
        };
        if !seen.insert(record.national_no.clone()) {
            stats.duplicates += 1;
            continue;
        }
        persons.push(record);
    }

    let mut missing_fathers = BTreeSet::new();
    let mut missing_mothers = BTreeSet::new();
    for person in &persons {
        for (parent, bucket) in [
            (&person.father_national_no, &mut missing_fathers),
            (&person.mother_national_no, &mut missing_mothers),
        ] {
            let Some(key) = parent else { continue };
            if seen.contains(key) {
                continue;
            }
            if filter.is_identity_key(key) {
                bucket.insert(key.clone());
            } else {
                stats.malformed_parent_refs += 1;
            }
        }
    }

    let locations: BTreeSet<PollingLocation> =
        persons.iter().filter_map(PersonRecord::location).collect();

    let normalized = NormalizedRoster {
        persons,
        missing_fathers,
        missing_mothers,
        locations: locations.into_iter().collect(),
        stats,
    };

    info!(
        rows_read = normalized.stats.rows_read,
        persons = normalized.persons.len(),
        missing_fathers = normalized.missing_fathers.len(),
        missing_mothers = normalized.missing_mothers.len(),
        duplicates = normalized.stats.duplicates,
        "Roster normalized"
    );

    normalized
}
