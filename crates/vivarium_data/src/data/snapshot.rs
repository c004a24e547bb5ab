use super::entity::EntityId;
use super::species::{BrainType, SpeciesType};
use serde::{Deserialize, Serialize};

/// Persistence record for one brain of one entity.
///
/// The simulation core treats this purely as flatten/unflatten glue plus a
/// generation index; the archive collaborator owns the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainSnapshot {
    pub entity_id: EntityId,
    pub species: SpeciesType,
    pub brain: BrainType,
    pub weights: Vec<f32>,
    pub fitness: f32,
    pub bias: f32,
    pub extra_param: f32,
    pub total_weight_count: usize,
}
