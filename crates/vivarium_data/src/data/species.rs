use serde::{Deserialize, Serialize};

/// Species of a simulated creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeciesType {
    /// Hunts other creatures for energy.
    Carnivore,
    /// Grazes on food nodes and flocks for safety.
    Herbivore,
    /// Opportunist feeding on carrion, fights when cornered.
    Scavenger,
}

impl SpeciesType {
    pub const ALL: [SpeciesType; 3] = [
        SpeciesType::Carnivore,
        SpeciesType::Herbivore,
        SpeciesType::Scavenger,
    ];
}

/// Behavioral concern served by one feed-forward network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrainType {
    /// Steering and locomotion.
    Movement,
    /// Food seeking and consumption.
    Eating,
    /// Attack and escape decisions.
    Combat,
    /// Boid cohesion/separation/alignment weighting.
    Flocking,
}

impl BrainType {
    pub const ALL: [BrainType; 4] = [
        BrainType::Movement,
        BrainType::Eating,
        BrainType::Combat,
        BrainType::Flocking,
    ];
}

/// Per-entity behaviour machine states. Not every species uses every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviourState {
    Walk,
    Eat,
    Attack,
    Escape,
}

impl BehaviourState {
    pub const ALL: [BehaviourState; 4] = [
        BehaviourState::Walk,
        BehaviourState::Eat,
        BehaviourState::Attack,
        BehaviourState::Escape,
    ];
}

/// Stimulus flags driving behaviour transitions. Shared by all species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StimulusFlag {
    OnEat,
    OnSearchFood,
    OnAttack,
    OnEscape,
}

impl StimulusFlag {
    pub const ALL: [StimulusFlag; 4] = [
        StimulusFlag::OnEat,
        StimulusFlag::OnSearchFood,
        StimulusFlag::OnAttack,
        StimulusFlag::OnEscape,
    ];
}
