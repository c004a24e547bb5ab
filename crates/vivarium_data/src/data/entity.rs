use super::species::{BrainType, SpeciesType};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque unique identifier of a simulated entity.
///
/// Ids come from a monotonically increasing counter and are never reused,
/// even after the entity is destroyed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// World position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position(pub Vec2);

/// Unit-ish facing direction of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading(pub Vec2);

impl Default for Heading {
    fn default() -> Self {
        Heading(Vec2::X)
    }
}

/// Energy reserve of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Energy(pub f32);

/// Health of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health(pub f32);

impl Default for Health {
    fn default() -> Self {
        Health(1.0)
    }
}

/// Species tag resolving per-species behaviour dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesTag(pub SpeciesType);

/// Sensory input vectors, one channel per brain the entity owns.
///
/// Filled by the sensor-wiring collaborator each tick; the evaluator only
/// requires that a channel's length matches the brain's declared input count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrainInputs {
    pub channels: HashMap<BrainType, Vec<f32>>,
}

/// Brain output vectors, one channel per brain, every element in (-1, 1).
///
/// A channel keeps its previous (stale) value on any tick where the brain's
/// output layer does not match its declared arity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrainOutputs {
    pub channels: HashMap<BrainType, Vec<f32>>,
}

/// Marker flag: the entity participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Alive;

/// Marker flag: the entity participates in flocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Boid;

/// Marker flag: the entity is currently pursued by a predator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Hunted;
