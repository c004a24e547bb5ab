//! Fitness shaping: per-tick, per-brain reward/punishment rules that
//! accumulate into each genome's fitness score.
//!
//! Each brain carries an adaptive multiplier `fitness_mod` giving a
//! self-reinforcing reward curve and a decaying punishment curve rather than
//! flat increments. Rules read settled action outcomes, never live world
//! state mid-tick.

use crate::config::FitnessConfig;
use crate::error::CoreError;
use crate::species::owns_brain;
use crate::world::ActionOutcome;
use std::collections::HashMap;
use vivarium_data::{BrainType, EntityId, SpeciesType};

const REWARD_MOD_GAIN: f32 = 1.1;
const REWARD_MOD_CEILING: f32 = 2.0;
const PUNISH_MOD_DECAY: f32 = 0.9;
const PUNISH_MOD_WEIGHT: f32 = 0.05;

/// Accumulated score of one brain of one entity over a generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrainScore {
    pub fitness: f32,
    pub fitness_mod: f32,
}

impl Default for BrainScore {
    fn default() -> Self {
        Self {
            fitness: 0.0,
            fitness_mod: 1.0,
        }
    }
}

impl BrainScore {
    pub fn reward(&mut self, base: f32) {
        self.fitness_mod = (self.fitness_mod * REWARD_MOD_GAIN).min(REWARD_MOD_CEILING);
        self.fitness += base * self.fitness_mod;
    }

    pub fn punish(&mut self, base: f32) {
        self.fitness_mod *= PUNISH_MOD_DECAY;
        self.fitness /= base + PUNISH_MOD_WEIGHT * self.fitness_mod;
    }
}

/// One shaping rule: folds a single outcome into a brain's score.
pub type FitnessRule = fn(&FitnessConfig, &ActionOutcome, &mut BrainScore);

/// Dispatch table keyed by (species, brain). A brain type the species does
/// not own is a hard failure.
pub fn rule_for(species: SpeciesType, brain: BrainType) -> Result<FitnessRule, CoreError> {
    if !owns_brain(species, brain) {
        return Err(CoreError::InvalidBrain { species, brain });
    }
    Ok(match brain {
        BrainType::Movement => movement_rule,
        BrainType::Eating => match species {
            SpeciesType::Scavenger => scavenger_eating_rule,
            _ => eating_rule,
        },
        BrainType::Combat => combat_rule,
        BrainType::Flocking => flocking_rule,
    })
}

/// Brain concern an outcome feeds back into.
#[must_use]
pub fn brain_for_outcome(outcome: &ActionOutcome) -> BrainType {
    match outcome {
        ActionOutcome::Moved { .. } => BrainType::Movement,
        ActionOutcome::Ate { .. } | ActionOutcome::SoughtFood { .. } => BrainType::Eating,
        ActionOutcome::DealtDamage { .. }
        | ActionOutcome::TookDamage { .. }
        | ActionOutcome::Escaped { .. } => BrainType::Combat,
        ActionOutcome::Flocked { .. } => BrainType::Flocking,
    }
}

fn movement_rule(config: &FitnessConfig, outcome: &ActionOutcome, score: &mut BrainScore) {
    let ActionOutcome::Moved {
        heading, toward, ..
    } = outcome
    else {
        return;
    };
    let aligned = match (heading.try_normalize(), toward.try_normalize()) {
        (Some(h), Some(t)) => h.dot(t) > config.alignment_dot,
        _ => false,
    };
    if aligned {
        score.reward(config.reward_base);
    } else {
        score.punish(config.punishment_base);
    }
}

fn eating_rule(config: &FitnessConfig, outcome: &ActionOutcome, score: &mut BrainScore) {
    match outcome {
        ActionOutcome::Ate { amount, .. } if *amount > 0.0 => score.reward(config.reward_base),
        ActionOutcome::SoughtFood {
            progressed: false, ..
        } => score.punish(config.punishment_base),
        _ => {}
    }
}

// Scavengers tolerate lean searches: progress alone earns a small reward.
fn scavenger_eating_rule(config: &FitnessConfig, outcome: &ActionOutcome, score: &mut BrainScore) {
    match outcome {
        ActionOutcome::Ate { amount, .. } if *amount > 0.0 => score.reward(config.reward_base),
        ActionOutcome::SoughtFood {
            progressed: true, ..
        } => score.reward(config.reward_base * 0.25),
        ActionOutcome::SoughtFood { .. } => score.punish(config.punishment_base),
        _ => {}
    }
}

fn combat_rule(config: &FitnessConfig, outcome: &ActionOutcome, score: &mut BrainScore) {
    match outcome {
        ActionOutcome::DealtDamage { killed, .. } => {
            score.reward(if *killed {
                config.reward_base * 2.0
            } else {
                config.reward_base
            });
        }
        ActionOutcome::TookDamage { .. } => score.punish(config.punishment_base),
        ActionOutcome::Escaped {
            gained_distance: true,
            ..
        } => score.reward(config.reward_base),
        ActionOutcome::Escaped { .. } => score.punish(config.punishment_base),
        _ => {}
    }
}

fn flocking_rule(config: &FitnessConfig, outcome: &ActionOutcome, score: &mut BrainScore) {
    let ActionOutcome::Flocked {
        cohesion,
        separation,
        alignment,
        ..
    } = outcome
    else {
        return;
    };
    let healthy = *cohesion <= config.cohesion_max
        && *separation >= config.separation_min
        && *alignment >= config.alignment_min;
    if healthy {
        score.reward(config.reward_base);
    } else {
        score.punish(config.punishment_base);
    }
}

/// Folds one tick's drained outcomes into the per-brain score board.
pub struct FitnessShaper {
    config: FitnessConfig,
}

impl FitnessShaper {
    #[must_use]
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn apply_tick(
        &self,
        outcomes: &[ActionOutcome],
        species_of: &HashMap<EntityId, SpeciesType>,
        scores: &mut HashMap<(EntityId, BrainType), BrainScore>,
    ) {
        for outcome in outcomes {
            let id = outcome.owner();
            let Some(&species) = species_of.get(&id) else {
                continue;
            };
            let brain = brain_for_outcome(outcome);
            // outcomes touching a brain the species does not own are skipped
            let Ok(rule) = rule_for(species, brain) else {
                continue;
            };
            let score = scores.entry((id, brain)).or_default();
            rule(&self.config, outcome, score);
        }
    }
}
