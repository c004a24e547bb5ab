//! Population-wide brain evaluation.
//!
//! Distinct entities (and distinct brains of one entity) share no mutable
//! state during a forward pass, so the whole population is evaluated in
//! parallel on the world's worker pool. Output channels are only overwritten
//! on a clean pass: any arity mismatch leaves the previous (stale) value in
//! place and logs a warning instead of failing the tick.

use crate::brain::forward::forward;
use crate::species::topology_for;
use crate::world::World;
use rayon::prelude::*;
use std::collections::HashMap;
use vivarium_data::{Brain, BrainInputs, BrainOutputs, BrainType, EntityId, SpeciesTag};

/// The evolving brain set of one entity, one network per owned concern.
pub type BrainSet = HashMap<BrainType, Brain>;

/// Runs one forward pass for every brain of every listed entity, writing
/// fresh values into each entity's [`BrainOutputs`] channels.
pub fn evaluate_population(world: &World, brains: &HashMap<EntityId, BrainSet>) {
    world.pool.install(|| {
        brains.par_iter().for_each(|(&id, set)| {
            evaluate_entity(world, id, set);
        });
    });
}

fn evaluate_entity(world: &World, id: EntityId, set: &BrainSet) {
    let Ok(inputs) = world.store.get_component::<BrainInputs>(id) else {
        return;
    };
    let Ok(tag) = world.store.get_component::<SpeciesTag>(id) else {
        return;
    };

    for (&brain_type, brain) in set {
        let Some(channel) = inputs.channels.get(&brain_type) else {
            continue;
        };
        let Ok(declared) = topology_for(tag.0, brain_type) else {
            tracing::warn!(entity = %id, brain = ?brain_type, "brain not owned by species, skipping");
            continue;
        };
        if brain.output_count() != declared.output_count() {
            // stale outputs are kept over partially-written ones
            tracing::warn!(
                entity = %id,
                brain = ?brain_type,
                expected = declared.output_count(),
                got = brain.output_count(),
                "output arity mismatch, keeping stale outputs"
            );
            continue;
        }
        match forward(brain, channel) {
            Ok(values) => {
                let _ = world
                    .store
                    .with_component_mut::<BrainOutputs, _>(id, |outputs| {
                        outputs.channels.insert(brain_type, values);
                    });
            }
            Err(error) => {
                tracing::warn!(
                    entity = %id,
                    brain = ?brain_type,
                    %error,
                    "forward pass rejected inputs, keeping stale outputs"
                );
            }
        }
    }
}
