//! Species dispatch: one agent record plus a species tag, with per-species
//! behaviour resolved through profile lookups keyed by species and brain
//! type rather than an inheritance hierarchy.

pub mod behaviour;
pub mod commands;

pub use commands::AgentCommand;

use crate::brain::topology::BrainTopology;
use crate::error::CoreError;
use crate::fsm::EnumIndexed;
use vivarium_data::{BehaviourState, BrainType, SpeciesType, StimulusFlag};

impl EnumIndexed for BehaviourState {
    const COUNT: usize = BehaviourState::ALL.len();

    fn index(self) -> usize {
        self as usize
    }
}

impl EnumIndexed for StimulusFlag {
    const COUNT: usize = StimulusFlag::ALL.len();

    fn index(self) -> usize {
        self as usize
    }
}

/// Static capability record of one species.
pub struct SpeciesProfile {
    pub species: SpeciesType,
    /// Brains this species owns, one per behavioral concern.
    pub brains: &'static [BrainType],
    /// Behaviour states this species wires into its machine.
    pub states: &'static [BehaviourState],
    /// Species this one preys on, if any.
    pub prey: Option<SpeciesType>,
    /// Species this one flees from, if any.
    pub predator: Option<SpeciesType>,
}

static CARNIVORE: SpeciesProfile = SpeciesProfile {
    species: SpeciesType::Carnivore,
    brains: &[BrainType::Movement, BrainType::Eating, BrainType::Combat],
    states: &[
        BehaviourState::Walk,
        BehaviourState::Eat,
        BehaviourState::Attack,
    ],
    prey: Some(SpeciesType::Herbivore),
    predator: None,
};

static HERBIVORE: SpeciesProfile = SpeciesProfile {
    species: SpeciesType::Herbivore,
    brains: &[BrainType::Movement, BrainType::Eating, BrainType::Flocking],
    states: &[
        BehaviourState::Walk,
        BehaviourState::Eat,
        BehaviourState::Escape,
    ],
    prey: None,
    predator: Some(SpeciesType::Carnivore),
};

static SCAVENGER: SpeciesProfile = SpeciesProfile {
    species: SpeciesType::Scavenger,
    brains: &[BrainType::Movement, BrainType::Eating, BrainType::Combat],
    states: &[
        BehaviourState::Walk,
        BehaviourState::Eat,
        BehaviourState::Attack,
        BehaviourState::Escape,
    ],
    prey: Some(SpeciesType::Scavenger),
    predator: Some(SpeciesType::Carnivore),
};

/// Profile lookup for a species tag.
#[must_use]
pub fn profile(species: SpeciesType) -> &'static SpeciesProfile {
    match species {
        SpeciesType::Carnivore => &CARNIVORE,
        SpeciesType::Herbivore => &HERBIVORE,
        SpeciesType::Scavenger => &SCAVENGER,
    }
}

/// Whether the species owns the given brain.
#[must_use]
pub fn owns_brain(species: SpeciesType, brain: BrainType) -> bool {
    profile(species).brains.contains(&brain)
}

/// Declared topology of one (species, brain) network. Looking up a brain
/// type the species does not own is a hard failure.
pub fn topology_for(species: SpeciesType, brain: BrainType) -> Result<BrainTopology, CoreError> {
    if !owns_brain(species, brain) {
        return Err(CoreError::InvalidBrain { species, brain });
    }
    Ok(match brain {
        // inputs: target dx, dy, own heading x, y
        BrainType::Movement => BrainTopology::new(4, vec![6, 2]),
        // inputs: hunger, food dx, dy
        BrainType::Eating => BrainTopology::new(3, vec![5, 2]),
        // inputs: threat dx, dy, own health, threat distance, own energy
        BrainType::Combat => BrainTopology::new(5, vec![6, 2]),
        // inputs: centroid dx, dy, nearest-mate dx, dy, mate heading x, y
        BrainType::Flocking => BrainTopology::new(6, vec![6, 3]),
    })
}
