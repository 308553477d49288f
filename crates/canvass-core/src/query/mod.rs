//! Parameterized query construction for the read path.

pub mod builder;
pub mod cypher;
pub mod filter;

pub use builder::InfluenceRankingPlan;
pub use cypher::{CypherQuery, ParamValue};
pub use filter::{
    CelfParams, Depth, InfluenceFilter, LocationScope, Relationship, RelationshipSet,
    TraversalFilter, MAX_DEPTH, MIN_DEPTH,
};
