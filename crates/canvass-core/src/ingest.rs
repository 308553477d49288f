//! Ingestion stages and resumable checkpoints.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CanvassError, CanvassResult};

/// A stage of the ingestion pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Locations,
    Persons,
    Placeholders,
    Father,
    Mother,
    Spouse,
    Sibling,
    VotesAt,
    Campaign,
}

impl Stage {
    /// Stages that build node data from the roster.
    pub const LOAD: [Stage; 3] = [Stage::Locations, Stage::Persons, Stage::Placeholders];

    /// Relationship passes. Each one reads edges committed by the passes before it.
    pub const LINK: [Stage; 5] = [
        Stage::Father,
        Stage::Mother,
        Stage::Spouse,
        Stage::Sibling,
        Stage::VotesAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locations => "locations",
            Self::Persons => "persons",
            Self::Placeholders => "placeholders",
            Self::Father => "father",
            Self::Mother => "mother",
            Self::Spouse => "spouse",
            Self::Sibling => "sibling",
            Self::VotesAt => "votes_at",
            Self::Campaign => "campaign",
        }
    }

    /// Relationship type written by a link stage.
    pub fn relationship_type(&self) -> Option<&'static str> {
        match self {
            Self::Father => Some("FATHER"),
            Self::Mother => Some("MOTHER"),
            Self::Spouse => Some("SPOUSE"),
            Self::Sibling => Some("SIBLING"),
            Self::VotesAt => Some("VOTES_AT"),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last committed position of an ingestion run.
///
/// For load stages `offset` counts committed rows and `cursor` is unset.
/// For link stages `cursor` is the greatest identity key of the last
/// committed batch and `offset` the number of rows scanned so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stage: Stage,
    pub offset: usize,
    pub cursor: Option<String>,
    pub batches: usize,
}

impl Checkpoint {
    /// Checkpoint at the very beginning of a stage.
    pub fn start_of(stage: Stage) -> Self {
        Self {
            stage,
            offset: 0,
            cursor: None,
            batches: 0,
        }
    }

    /// Where a stage should begin given this checkpoint, or `None` if the
    /// stage was already completed before it.
    pub fn resume_point(&self, stage: Stage) -> Option<(usize, Option<String>)> {
        if stage < self.stage {
            None
        } else if stage == self.stage {
            Some((self.offset, self.cursor.clone()))
        } else {
            Some((0, None))
        }
    }

    pub fn load(path: &Path) -> CanvassResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the checkpoint through a temp file so a crash never leaves a torn file.
    pub fn save(&self, path: &Path) -> CanvassResult<()> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path).map_err(CanvassError::from)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' offset {}", self.stage, self.offset)?;
        if let Some(cursor) = &self.cursor {
            write!(f, " cursor {}", cursor)?;
        }
        Ok(())
    }
}
