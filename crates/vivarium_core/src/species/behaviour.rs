//! State behaviour providers for the four agent behaviour states.
//!
//! Each provider builds one tick's action set from the owner's parameter
//! array. The convention is fixed across all four: `[Entity(id),
//! Species(species), Vector(steer)]`, where `steer` comes out of the brain
//! channel driving the state. A malformed array yields an empty action set,
//! never an error; the entity simply idles for the tick.

use crate::fsm::{BehaviourActions, BehaviourParam, BehaviourProvider, Lane};
use crate::grid::NodeKind;
use crate::species::{profile, AgentCommand};
use crate::world::World;
use glam::Vec2;
use vivarium_data::{
    Boid, BrainOutputs, BrainType, Energy, EntityId, Heading, Position, SpeciesTag, SpeciesType,
    StimulusFlag,
};

/// Energy level below which an agent goes looking for food.
pub const HUNGER_THRESHOLD: f32 = 3.0;
/// Energy level at which an agent stops eating or hunting.
pub const SATED_THRESHOLD: f32 = 8.0;
/// Distance at which a predator registers as a threat.
pub const THREAT_RADIUS: f32 = 12.0;
/// Distance beyond which a fleeing agent considers itself safe.
pub const SAFE_RADIUS: f32 = 20.0;
/// Distance within which prey can be struck or a node consumed.
pub const CONTACT_RANGE: f32 = 1.5;
/// Distance at which prey registers as worth hunting.
pub const PREY_RADIUS: f32 = 10.0;
/// Flock neighbourhood radius.
pub const FLOCK_RADIUS: f32 = 8.0;

type Actions = BehaviourActions<StimulusFlag, AgentCommand>;

fn unpack(params: &[BehaviourParam]) -> Option<(EntityId, SpeciesType, Vec2)> {
    let id = params.first()?.as_entity()?;
    let species = params.get(1)?.as_species()?;
    let steer = params.get(2)?.as_vector()?;
    Some((id, species, steer))
}

fn predator_nearby(ctx: &World, id: EntityId, species: SpeciesType, radius: f32) -> Option<Vec2> {
    let predator = profile(species).predator?;
    let position = ctx.store.get_component::<Position>(id).ok()?;
    let (threat_id, threat_pos) = ctx.grid.nearest_entity(predator, position.0)?;
    if threat_id != id && position.0.distance(threat_pos) <= radius {
        Some(threat_pos)
    } else {
        None
    }
}

fn energy(ctx: &World, id: EntityId) -> f32 {
    ctx.store
        .get_component::<Energy>(id)
        .map(|e| e.0)
        .unwrap_or(0.0)
}

/// Flock steering vectors relative to the agent: toward the local centroid,
/// away from the nearest mate, along the mate's heading.
pub(crate) fn flock_vectors(
    ctx: &World,
    id: EntityId,
    species: SpeciesType,
) -> Option<(Vec2, Vec2, Vec2)> {
    let position = ctx.store.get_component::<Position>(id).ok()?.0;
    let positions = ctx.store.components::<Position>();
    let tags = ctx.store.components::<SpeciesTag>();

    let mut centroid = Vec2::ZERO;
    let mut count = 0u32;
    let mut nearest: Option<(EntityId, Vec2, f32)> = None;
    for (&other, other_pos) in &positions {
        if other == id || tags.get(&other).map(|t| t.0) != Some(species) {
            continue;
        }
        let dist = position.distance(other_pos.0);
        if dist > FLOCK_RADIUS {
            continue;
        }
        centroid += other_pos.0;
        count += 1;
        if nearest.map_or(true, |(_, _, d)| dist < d) {
            nearest = Some((other, other_pos.0, dist));
        }
    }
    let (mate, mate_pos, _) = nearest?;
    let centroid = centroid / count as f32;
    let mate_heading = ctx
        .store
        .get_component::<Heading>(mate)
        .map(|h| h.0)
        .unwrap_or(Vec2::X);
    Some((centroid - position, position - mate_pos, mate_heading))
}

/// Per-component flock gains from the flocking brain: each output in
/// [-1, 1] maps to a [0, 1] gain on cohesion, separation, and alignment.
/// Without a usable channel the blend is even.
fn flock_gains(ctx: &World, id: EntityId) -> (f32, f32, f32) {
    let channel = ctx
        .store
        .get_component::<BrainOutputs>(id)
        .ok()
        .and_then(|o| o.channels.get(&BrainType::Flocking).cloned());
    match channel {
        Some(c) if c.len() >= 3 => (
            0.5 * (c[0] + 1.0),
            0.5 * (c[1] + 1.0),
            0.5 * (c[2] + 1.0),
        ),
        _ => (1.0, 1.0, 1.0),
    }
}

/// Default roaming state: steer by the movement brain, advance, and (for
/// boids) keep formation with the flock.
pub struct WalkBehaviour {
    pub speed: f32,
}

impl BehaviourProvider<StimulusFlag, AgentCommand> for WalkBehaviour {
    fn tick(&self, ctx: &World, params: &[BehaviourParam]) -> Actions {
        let mut actions = Actions::new();
        let Some((id, species, steer)) = unpack(params) else {
            return actions;
        };

        actions.push(
            0,
            Lane::Parallel,
            AgentCommand::Steer {
                id,
                direction: steer,
                weight: 0.3,
            },
        );
        if ctx.store.has_flag::<Boid>(id) && profile(species).brains.contains(&BrainType::Flocking)
        {
            if let Some((cohesion, separation, alignment)) = flock_vectors(ctx, id, species) {
                // the flocking brain's evolved gains weight each component
                let (gc, gs, ga) = flock_gains(ctx, id);
                actions.push(
                    0,
                    Lane::Parallel,
                    AgentCommand::Flock {
                        id,
                        cohesion: cohesion * gc,
                        separation: separation * gs,
                        alignment: alignment * ga,
                    },
                );
            }
        }
        let speed = self.speed;
        actions.push(
            1,
            Lane::Parallel,
            AgentCommand::Advance {
                id,
                speed,
                toward: steer,
            },
        );

        actions.on_transition(move |ctx: &World| {
            if predator_nearby(ctx, id, species, THREAT_RADIUS).is_some() {
                return Some(StimulusFlag::OnEscape);
            }
            if energy(ctx, id) < HUNGER_THRESHOLD {
                if let Some(prey) = profile(species).prey {
                    let position = ctx.store.get_component::<Position>(id).ok()?.0;
                    if let Some((prey_id, prey_pos)) = ctx.grid.nearest_entity(prey, position) {
                        if prey_id != id && position.distance(prey_pos) <= PREY_RADIUS {
                            return Some(StimulusFlag::OnAttack);
                        }
                    }
                }
                return Some(StimulusFlag::OnSearchFood);
            }
            None
        });
        actions
    }
}

/// Foraging state: close on the nearest matching node and consume from it.
pub struct EatBehaviour {
    /// Node kind this species forages from.
    pub kind: NodeKind,
    /// Stock withdrawn per successful bite.
    pub bite: f32,
    pub speed: f32,
}

impl BehaviourProvider<StimulusFlag, AgentCommand> for EatBehaviour {
    fn tick(&self, ctx: &World, params: &[BehaviourParam]) -> Actions {
        let mut actions = Actions::new();
        let Some((id, species, steer)) = unpack(params) else {
            return actions;
        };
        let Ok(position) = ctx.store.get_component::<Position>(id) else {
            return actions;
        };

        match ctx.grid.nearest_node(self.kind, position.0) {
            Some(node) => {
                let toward = node.position - position.0;
                // brain output biases the approach, the node anchors it
                let direction = toward + steer * 0.25;
                actions.push(
                    0,
                    Lane::Parallel,
                    AgentCommand::Steer {
                        id,
                        direction,
                        weight: 0.5,
                    },
                );
                if toward.length() <= CONTACT_RANGE {
                    actions.push(
                        1,
                        Lane::Parallel,
                        AgentCommand::Consume {
                            id,
                            node: node.id,
                            amount: self.bite,
                        },
                    );
                } else {
                    actions.push(
                        1,
                        Lane::Parallel,
                        AgentCommand::Advance {
                            id,
                            speed: self.speed,
                            toward,
                        },
                    );
                }
            }
            None => {
                // nothing to forage: wander on the brain's steer
                actions.push(
                    0,
                    Lane::Parallel,
                    AgentCommand::Steer {
                        id,
                        direction: steer,
                        weight: 0.3,
                    },
                );
                actions.push(
                    1,
                    Lane::Parallel,
                    AgentCommand::Advance {
                        id,
                        speed: self.speed,
                        toward: steer,
                    },
                );
            }
        }

        actions.on_transition(move |ctx: &World| {
            if predator_nearby(ctx, id, species, THREAT_RADIUS).is_some() {
                return Some(StimulusFlag::OnEscape);
            }
            if energy(ctx, id) >= SATED_THRESHOLD {
                return Some(StimulusFlag::OnEat);
            }
            None
        });
        actions
    }
}

/// Hunting state: close on the nearest prey and strike in contact range.
/// The strike is sequential so simultaneous killing blows cannot both land.
pub struct AttackBehaviour {
    pub damage: f32,
    pub speed: f32,
}

impl BehaviourProvider<StimulusFlag, AgentCommand> for AttackBehaviour {
    fn tick(&self, ctx: &World, params: &[BehaviourParam]) -> Actions {
        let mut actions = Actions::new();
        let Some((id, species, steer)) = unpack(params) else {
            return actions;
        };
        let Some(prey) = profile(species).prey else {
            return actions;
        };
        let Ok(position) = ctx.store.get_component::<Position>(id) else {
            return actions;
        };

        let target = ctx
            .grid
            .nearest_entity(prey, position.0)
            .filter(|(target, _)| *target != id);
        if let Some((target, target_pos)) = target {
            let toward = target_pos - position.0;
            actions.push(
                0,
                Lane::Parallel,
                AgentCommand::Steer {
                    id,
                    direction: toward + steer * 0.25,
                    weight: 0.6,
                },
            );
            if toward.length() <= CONTACT_RANGE {
                actions.push(
                    1,
                    Lane::Sequential,
                    AgentCommand::Strike {
                        id,
                        target,
                        damage: self.damage,
                    },
                );
            } else {
                actions.push(
                    1,
                    Lane::Parallel,
                    AgentCommand::Advance {
                        id,
                        speed: self.speed,
                        toward,
                    },
                );
            }
        }

        let lost_target = target.is_none();
        actions.on_transition(move |ctx: &World| {
            if predator_nearby(ctx, id, species, THREAT_RADIUS).is_some() {
                return Some(StimulusFlag::OnEscape);
            }
            if lost_target || energy(ctx, id) >= SATED_THRESHOLD {
                return Some(StimulusFlag::OnEat);
            }
            None
        });
        actions
    }
}

/// Flight state: run from the nearest predator until outside the safe
/// radius.
pub struct EscapeBehaviour {
    pub speed: f32,
}

impl BehaviourProvider<StimulusFlag, AgentCommand> for EscapeBehaviour {
    fn tick(&self, ctx: &World, params: &[BehaviourParam]) -> Actions {
        let mut actions = Actions::new();
        let Some((id, species, steer)) = unpack(params) else {
            return actions;
        };

        match predator_nearby(ctx, id, species, SAFE_RADIUS) {
            Some(threat) => {
                actions.push(
                    0,
                    Lane::Parallel,
                    AgentCommand::Flee {
                        id,
                        from: threat - steer * 0.1,
                        speed: self.speed,
                    },
                );
            }
            None => {
                actions.push(
                    0,
                    Lane::Parallel,
                    AgentCommand::Advance {
                        id,
                        speed: self.speed,
                        toward: steer,
                    },
                );
            }
        }

        actions.on_transition(move |ctx: &World| {
            if predator_nearby(ctx, id, species, SAFE_RADIUS).is_none() {
                return Some(StimulusFlag::OnEat);
            }
            None
        });
        actions
    }
}
