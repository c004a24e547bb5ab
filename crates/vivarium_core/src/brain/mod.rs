//! Layered feed-forward brains: topology registry, forward pass, and the
//! genome flatten/unflatten contract.

pub mod forward;
pub mod genome;
pub mod topology;

pub use forward::forward;
pub use genome::{flatten, unflatten};
pub use topology::BrainTopology;
