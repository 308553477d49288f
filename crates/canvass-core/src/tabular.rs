//! CSV reading with up-front column validation.

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{CanvassError, CanvassResult};

/// Read every row of a headered CSV into `T`, failing with a validation
/// error that names all missing `required` columns before any row is parsed.
pub fn read_csv<T, R>(reader: R, required: &[&str], source: &str) -> CanvassResult<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(CanvassError::validation(format!(
            "{} is missing required column(s): {}",
            source,
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    for record in csv_reader.deserialize() {
        rows.push(record?);
    }
    debug!(source, rows = rows.len(), "Read CSV");
    Ok(rows)
}

/// Open a CSV file and read it with [`read_csv`].
pub fn read_csv_path<T: DeserializeOwned>(path: &Path, required: &[&str]) -> CanvassResult<Vec<T>> {
    let file = std::fs::File::open(path)?;
    read_csv(file, required, &path.display().to_string())
}
