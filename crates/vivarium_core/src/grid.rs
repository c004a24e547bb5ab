//! External world/grid collaborator interface.
//!
//! The spatial representation and its nearest-neighbour queries live outside
//! the core; the simulation consumes this trait and never reimplements it.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use vivarium_data::{EntityId, SpeciesType};

/// Identifier of a grid node (food source, water, carrion site).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Kind of resource a grid node offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Food,
    Water,
    Carrion,
}

/// A resource node as reported by the grid collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Vec2,
}

/// Spatial queries supplied by the world/grid collaborator.
pub trait WorldGrid: Send + Sync {
    /// Nearest node of the given kind, if any exists.
    fn nearest_node(&self, kind: NodeKind, position: Vec2) -> Option<GridNode>;

    /// Nearest entity of the given species and its position, if any.
    fn nearest_entity(&self, species: SpeciesType, position: Vec2) -> Option<(EntityId, Vec2)>;

    /// Whether a position lies inside the simulated area.
    fn is_within_bounds(&self, position: Vec2) -> bool;
}
