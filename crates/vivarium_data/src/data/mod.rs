//! Plain data model shared by every Vivarium crate.

pub mod entity;
pub mod genome;
pub mod snapshot;
pub mod species;
