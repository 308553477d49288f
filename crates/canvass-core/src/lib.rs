//! Canvass Core Library
//!
//! Domain models and pure logic for the electoral canvassing graph: roster
//! normalization, campaign overlays, query building and result shaping.

pub mod campaign;
pub mod config;
pub mod error;
pub mod ingest;
pub mod query;
pub mod roster;
pub mod shape;
pub mod tabular;

pub use error::{CanvassError, CanvassResult};
