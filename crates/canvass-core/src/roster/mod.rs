//! Voter roster input: models, CSV reading and normalization.

pub mod model;
pub mod normalize;

use std::io::Read;
use std::path::Path;

use crate::error::CanvassResult;
use crate::tabular;

pub use model::{PersonRecord, PollingLocation, RawRosterRow};
pub use normalize::{normalize, NormalizeStats, NormalizedRoster, PlannedNodes, RosterFilter};

/// Columns every roster file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "national_no",
    "first_name",
    "father_name",
    "grand_name",
    "family_name",
    "father_national_no",
    "mother_national_no",
    "dob",
    "age",
    "religion",
    "address",
    "circle",
    "center",
    "box",
];

/// Read a roster CSV file.
pub fn read_roster(path: &Path) -> CanvassResult<Vec<RawRosterRow>> {
    tabular::read_csv_path(path, REQUIRED_COLUMNS)
}

/// Read a roster CSV from any reader.
pub fn read_roster_from<R: Read>(reader: R) -> CanvassResult<Vec<RawRosterRow>> {
    tabular::read_csv(reader, REQUIRED_COLUMNS, "roster")
}
