use thiserror::Error;
use vivarium_data::{BrainType, EntityId, SpeciesType};

/// Errors surfaced by the simulation core.
///
/// Everyday non-events (an unconfigured transition, a duplicate component
/// add, an abandoned crossover attempt) are deliberately *not* errors; only
/// contract violations reach this enum.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("entity {0} has no component of type {1}")]
    ComponentMissing(EntityId, &'static str),

    #[error("entity {0} has no flag of type {1}")]
    FlagMissing(EntityId, &'static str),

    #[error("species {species:?} does not own a {brain:?} brain")]
    InvalidBrain {
        species: SpeciesType,
        brain: BrainType,
    },

    #[error("layer expects {expected} inputs, got {got}")]
    InputArity { expected: usize, got: usize },

    #[error("genome carries {got} genes, topology requires {expected}")]
    GenomeShape { expected: usize, got: usize },

    #[error("behaviour arena misconfigured: {0}")]
    StateArena(String),
}
