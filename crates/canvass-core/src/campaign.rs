//! Campaign overlay: mutable per-person attributes applied after ingestion.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CanvassResult;
use crate::roster::model::clean;
use crate::tabular;

/// Campaign property names as stored on Person nodes, in overlay column order.
pub const CAMPAIGN_FIELDS: &[&str] = &[
    "phone_number",
    "credibility",
    "type",
    "principal_coordinator",
    "sub_coordinator",
    "Y_2013",
    "Y_2016",
    "Y_2020",
    "Y_2021",
    "Y_2024",
];

/// Which overlay column identifies the Person to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayJoin {
    #[default]
    NationalNo,
    PrimaryKey,
}

impl OverlayJoin {
    /// Column in the overlay file, and property on Person nodes.
    pub fn column(&self) -> &'static str {
        match self {
            Self::NationalNo => "national_no",
            Self::PrimaryKey => "primary_key",
        }
    }
}

/// One overlay row as read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOverlayRow {
    pub national_no: Option<String>,
    pub primary_key: Option<String>,
    pub phone_number: Option<String>,
    pub credibility: Option<String>,
    #[serde(rename = "type")]
    pub voter_type: Option<String>,
    pub principal_coordinator: Option<String>,
    pub sub_coordinator: Option<String>,
    #[serde(rename = "Y_2013")]
    pub y_2013: Option<String>,
    #[serde(rename = "Y_2016")]
    pub y_2016: Option<String>,
    #[serde(rename = "Y_2020")]
    pub y_2020: Option<String>,
    #[serde(rename = "Y_2021")]
    pub y_2021: Option<String>,
    #[serde(rename = "Y_2024")]
    pub y_2024: Option<String>,
}

impl RawOverlayRow {
    fn into_parts(self) -> (Option<String>, Option<String>, CampaignFields) {
        let fields = CampaignFields {
            phone_number: clean(self.phone_number),
            credibility: clean(self.credibility),
            voter_type: clean(self.voter_type),
            principal_coordinator: clean(self.principal_coordinator),
            sub_coordinator: clean(self.sub_coordinator),
            y_2013: clean(self.y_2013),
            y_2016: clean(self.y_2016),
            y_2020: clean(self.y_2020),
            y_2021: clean(self.y_2021),
            y_2024: clean(self.y_2024),
        };
        (clean(self.national_no), clean(self.primary_key), fields)
    }
}

/// Mutable campaign attributes. `None` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignFields {
    pub phone_number: Option<String>,
    pub credibility: Option<String>,
    #[serde(rename = "type")]
    pub voter_type: Option<String>,
    pub principal_coordinator: Option<String>,
    pub sub_coordinator: Option<String>,
    #[serde(rename = "Y_2013")]
    pub y_2013: Option<String>,
    #[serde(rename = "Y_2016")]
    pub y_2016: Option<String>,
    #[serde(rename = "Y_2020")]
    pub y_2020: Option<String>,
    #[serde(rename = "Y_2021")]
    pub y_2021: Option<String>,
    #[serde(rename = "Y_2024")]
    pub y_2024: Option<String>,
}

impl CampaignFields {
    /// Property name / value pairs, in [`CAMPAIGN_FIELDS`] order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("phone_number", self.phone_number.as_deref()),
            ("credibility", self.credibility.as_deref()),
            ("type", self.voter_type.as_deref()),
            ("principal_coordinator", self.principal_coordinator.as_deref()),
            ("sub_coordinator", self.sub_coordinator.as_deref()),
            ("Y_2013", self.y_2013.as_deref()),
            ("Y_2016", self.y_2016.as_deref()),
            ("Y_2020", self.y_2020.as_deref()),
            ("Y_2021", self.y_2021.as_deref()),
            ("Y_2024", self.y_2024.as_deref()),
        ]
    }
}

/// A keyed campaign update ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignUpdate {
    pub key: String,
    pub fields: CampaignFields,
}

/// Prepared overlay: one update per key, later rows winning.
#[derive(Debug, Clone, Default)]
pub struct PreparedOverlay {
    pub updates: Vec<CampaignUpdate>,
    pub rows_without_key: usize,
    pub superseded_rows: usize,
}

/// Read an overlay CSV. The join column and every campaign column are required.
pub fn read_overlay(path: &Path, join: OverlayJoin) -> CanvassResult<Vec<RawOverlayRow>> {
    let mut required = vec![join.column()];
    required.extend_from_slice(CAMPAIGN_FIELDS);
    tabular::read_csv_path(path, &required)
}

/// Key and dedupe overlay rows.
pub fn prepare_overlay(rows: Vec<RawOverlayRow>, join: OverlayJoin) -> PreparedOverlay {
    let mut prepared = PreparedOverlay::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let (national_no, primary_key, fields) = row.into_parts();
        let key = match join {
            OverlayJoin::NationalNo => national_no,
            OverlayJoin::PrimaryKey => primary_key,
        };
        let Some(key) = key else {
            prepared.rows_without_key += 1;
            continue;
        };
        match index.get(&key) {
            Some(&pos) => {
                prepared.updates[pos].fields = fields;
                prepared.superseded_rows += 1;
            }
            None => {
                index.insert(key.clone(), prepared.updates.len());
                prepared.updates.push(CampaignUpdate { key, fields });
            }
        }
    }

    prepared
}
