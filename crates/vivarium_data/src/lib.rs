//! Core data structures for the Vivarium simulation.

pub mod data;

pub use data::entity::{
    Alive, Boid, BrainInputs, BrainOutputs, Energy, EntityId, Heading, Health, Hunted, Position,
    SpeciesTag,
};
pub use data::genome::{Brain, Genome, Layer, Neuron};
pub use data::snapshot::BrainSnapshot;
pub use data::species::{BehaviourState, BrainType, SpeciesType, StimulusFlag};
