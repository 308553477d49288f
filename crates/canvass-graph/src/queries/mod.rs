//! Read-path services: run a query shape against a store and shape the rows.

pub mod celf;
pub mod family;
pub mod influence;
pub mod locations;
pub mod ranks;

pub use celf::influence_ranking;
pub use family::family_view;
pub use influence::person_influence;
pub use locations::{boxes, centers, circles, location_counts};
pub use ranks::relative_ranks;
