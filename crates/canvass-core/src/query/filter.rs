//! Validated filter primitives for traversal queries.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CanvassError, CanvassResult};

/// Shallowest supported traversal.
pub const MIN_DEPTH: u32 = 1;
/// Deepest supported traversal. Also the literal bound of the family path pattern.
pub const MAX_DEPTH: u32 = 5;

/// Family relationship types a traversal may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    Father,
    Mother,
    Spouse,
    Sibling,
}

impl Relationship {
    pub const ALL: [Relationship; 4] = [
        Relationship::Father,
        Relationship::Mother,
        Relationship::Spouse,
        Relationship::Sibling,
    ];

    /// The relationship type name in the graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Father => "FATHER",
            Self::Mother => "MOTHER",
            Self::Spouse => "SPOUSE",
            Self::Sibling => "SIBLING",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = CanvassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FATHER" => Ok(Self::Father),
            "MOTHER" => Ok(Self::Mother),
            "SPOUSE" => Ok(Self::Spouse),
            "SIBLING" => Ok(Self::Sibling),
            other => Err(CanvassError::invalid_filter(format!(
                "unknown relationship type '{}'",
                other
            ))),
        }
    }
}

/// A non-empty set of relationship types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipSet(BTreeSet<Relationship>);

impl RelationshipSet {
    pub fn new(types: impl IntoIterator<Item = Relationship>) -> CanvassResult<Self> {
        let set: BTreeSet<Relationship> = types.into_iter().collect();
        if set.is_empty() {
            return Err(CanvassError::invalid_filter(
                "select at least one relationship type",
            ));
        }
        Ok(Self(set))
    }

    pub fn all() -> Self {
        Self(Relationship::ALL.into_iter().collect())
    }

    pub fn contains(&self, rel: Relationship) -> bool {
        self.0.contains(&rel)
    }

    /// Type names in a stable order, for binding as a list parameter.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// Maximum number of relationship hops, within `MIN_DEPTH..=MAX_DEPTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Depth(u32);

impl Depth {
    pub fn new(depth: u32) -> CanvassResult<Self> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(CanvassError::invalid_filter(format!(
                "depth must be between {} and {}, got {}",
                MIN_DEPTH, MAX_DEPTH, depth
            )));
        }
        Ok(Self(depth))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Location level a population is scoped to, identified by graph element id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum LocationScope {
    Circle(String),
    Center(String),
    Box(String),
}

impl LocationScope {
    /// Pick the most specific level given: box, then center, then circle.
    pub fn most_specific(
        circle: Option<&str>,
        center: Option<&str>,
        box_id: Option<&str>,
    ) -> CanvassResult<Self> {
        let non_blank = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from);

        if let Some(id) = non_blank(box_id) {
            Ok(Self::Box(id))
        } else if let Some(id) = non_blank(center) {
            Ok(Self::Center(id))
        } else if let Some(id) = non_blank(circle) {
            Ok(Self::Circle(id))
        } else {
            Err(CanvassError::invalid_filter(
                "a circle, center or box must be selected",
            ))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Circle(id) | Self::Center(id) | Self::Box(id) => id,
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            Self::Circle(_) => "circle",
            Self::Center(_) => "center",
            Self::Box(_) => "box",
        }
    }
}

/// Filter for location-scoped relative traversals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalFilter {
    pub scope: LocationScope,
    pub relationships: RelationshipSet,
    pub depth: Depth,
}

impl TraversalFilter {
    pub fn new(
        scope: LocationScope,
        relationships: impl IntoIterator<Item = Relationship>,
        depth: u32,
    ) -> CanvassResult<Self> {
        Ok(Self {
            scope,
            relationships: RelationshipSet::new(relationships)?,
            depth: Depth::new(depth)?,
        })
    }
}

/// Filter for single-person influence traversals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfluenceFilter {
    pub national_no: String,
    pub relationships: RelationshipSet,
    pub depth: Depth,
}

impl InfluenceFilter {
    pub fn new(
        national_no: &str,
        relationships: impl IntoIterator<Item = Relationship>,
        depth: u32,
    ) -> CanvassResult<Self> {
        let national_no = national_no.trim();
        if national_no.is_empty() {
            return Err(CanvassError::invalid_filter("national number is required"));
        }
        Ok(Self {
            national_no: national_no.to_string(),
            relationships: RelationshipSet::new(relationships)?,
            depth: Depth::new(depth)?,
        })
    }
}

/// Parameters of the CELF influence-maximization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CelfParams {
    pub seed_set_size: u32,
    pub monte_carlo_simulations: u32,
    pub propagation_probability: f64,
}

impl Default for CelfParams {
    fn default() -> Self {
        Self {
            seed_set_size: 10,
            monte_carlo_simulations: 1000,
            propagation_probability: 0.1,
        }
    }
}

impl CelfParams {
    pub fn validate(&self) -> CanvassResult<()> {
        if !(1..=100).contains(&self.seed_set_size) {
            return Err(CanvassError::invalid_filter("seed set size must be between 1 and 100"));
        }
        if !(1..=10_000).contains(&self.monte_carlo_simulations) {
            return Err(CanvassError::invalid_filter(
                "monte carlo simulations must be between 1 and 10000",
            ));
        }
        if !(0.0..=1.0).contains(&self.propagation_probability) {
            return Err(CanvassError::invalid_filter(
                "propagation probability must be between 0 and 1",
            ));
        }
        Ok(())
    }
}
