//! Roster record models.

use serde::{Deserialize, Serialize};

/// Text the source rosters use for "no value".
pub const MISSING_SENTINEL: &str = "missing";

/// Normalize a raw cell: trims, and maps empty cells and the `missing`
/// sentinel to `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(MISSING_SENTINEL) {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// One row of the roster CSV exactly as read, before any cleaning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRosterRow {
    pub national_no: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub father_name: Option<String>,
    pub grand_name: Option<String>,
    pub family_name: Option<String>,
    pub father_national_no: Option<String>,
    pub mother_national_no: Option<String>,
    pub new_big_key: Option<String>,
    pub dob: Option<String>,
    pub age: Option<String>,
    pub religion: Option<String>,
    pub address: Option<String>,
    pub circle: Option<String>,
    pub center: Option<String>,
    #[serde(rename = "box")]
    pub box_name: Option<String>,
    pub primary_key: Option<String>,
    pub is_unique_shrink_name: Option<String>,
    pub unmatched: Option<String>,
}

impl RawRosterRow {
    /// Whether the row passes the canonical-row predicate.
    ///
    /// Rows without the optional flag columns pass.
    pub fn is_canonical(&self) -> bool {
        let unique_name = match clean(self.is_unique_shrink_name.clone()) {
            Some(flag) => parse_flag(&flag).unwrap_or(false),
            None => true,
        };
        let unmatched = match clean(self.unmatched.clone()) {
            Some(n) => n.parse::<f64>().map(|n| n != 0.0).unwrap_or(true),
            None => false,
        };
        unique_name && !unmatched
    }

    /// Clean the row into a person record. Returns `None` when the row has
    /// no usable identity key.
    pub fn into_record(self) -> Option<PersonRecord> {
        let national_no = clean(self.national_no)?;
        Some(PersonRecord {
            national_no,
            full_name: clean(self.full_name),
            first_name: clean(self.first_name),
            father_name: clean(self.father_name),
            grand_name: clean(self.grand_name),
            family_name: clean(self.family_name),
            father_national_no: clean(self.father_national_no),
            mother_national_no: clean(self.mother_national_no),
            new_big_key: clean(self.new_big_key),
            dob: clean(self.dob),
            age: clean(self.age).and_then(|a| parse_age(&a)),
            religion: clean(self.religion),
            address: clean(self.address),
            circle: clean(self.circle),
            center: clean(self.center),
            box_name: clean(self.box_name),
            primary_key: clean(self.primary_key),
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

// Exports sometimes write integer columns as floats ("42.0").
fn parse_age(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// A cleaned roster entry, one per identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub national_no: String,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub father_name: Option<String>,
    pub grand_name: Option<String>,
    pub family_name: Option<String>,
    pub father_national_no: Option<String>,
    pub mother_national_no: Option<String>,
    pub new_big_key: Option<String>,
    pub dob: Option<String>,
    pub age: Option<i64>,
    pub religion: Option<String>,
    pub address: Option<String>,
    pub circle: Option<String>,
    pub center: Option<String>,
    #[serde(rename = "box")]
    pub box_name: Option<String>,
    pub primary_key: Option<String>,
}

impl PersonRecord {
    /// A record carrying only an identity key.
    pub fn bare(national_no: impl Into<String>) -> Self {
        Self {
            national_no: national_no.into(),
            full_name: None,
            first_name: None,
            father_name: None,
            grand_name: None,
            family_name: None,
            father_national_no: None,
            mother_national_no: None,
            new_big_key: None,
            dob: None,
            age: None,
            religion: None,
            address: None,
            circle: None,
            center: None,
            box_name: None,
            primary_key: None,
        }
    }

    /// The polling location the person is registered at, when complete.
    pub fn location(&self) -> Option<PollingLocation> {
        Some(PollingLocation {
            circle: self.circle.clone()?,
            center: self.center.clone()?,
            box_name: self.box_name.clone()?,
        })
    }

    /// Display name: the full name when present, else the joined name parts.
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = &self.full_name {
            return Some(full.clone());
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
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// A (circle, center, box) triple. Box identity is the whole triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PollingLocation {
    pub circle: String,
    pub center: String,
    #[serde(rename = "box")]
    pub box_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_maps_sentinel_and_blank_to_none() {
        assert_eq!(clean(Some("missing".into())), None);
        assert_eq!(clean(Some("MISSING".into())), None);
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(clean(None), None);
        assert_eq!(clean(Some(" 12 ".into())), Some("12".into()));
    }

    #[test]
    fn test_canonical_predicate() {
        let mut row = RawRosterRow::default();
        assert!(row.is_canonical());

        row.is_unique_shrink_name = Some("false".into());
        assert!(!row.is_canonical());

        row.is_unique_shrink_name = Some("True".into());
        row.unmatched = Some("0".into());
        assert!(row.is_canonical());

        row.unmatched = Some("1".into());
        assert!(!row.is_canonical());
    }

    #[test]
    fn test_into_record_requires_identity_key() {
        let row = RawRosterRow {
            national_no: Some("missing".into()),
            ..Default::default()
        };
        assert!(row.into_record().is_none());

        let row = RawRosterRow {
            national_no: Some("2990101234".into()),
            age: Some("41.0".into()),
            father_national_no: Some("missing".into()),
            ..Default::default()
        };
        let record = row.into_record().unwrap();
        assert_eq!(record.age, Some(41));
        assert_eq!(record.father_national_no, None);
    }

    #[test]
    fn test_location_needs_all_three_levels() {
        let mut record = PersonRecord::bare("2990101234");
        record.circle = Some("Circle 1".into());
        record.center = Some("School A".into());
        assert!(record.location().is_none());

        record.box_name = Some("3".into());
        let loc = record.location().unwrap();
        assert_eq!(loc.box_name, "3");
    }

    #[test]
    fn test_display_name_falls_back_to_parts() {
        let mut record = PersonRecord::bare("2990101234");
        assert_eq!(record.display_name(), None);
        record.first_name = Some("Omar".into());
        record.family_name = Some("Haddad".into());
        assert_eq!(record.display_name().as_deref(), Some("Omar Haddad"));
    }
}
