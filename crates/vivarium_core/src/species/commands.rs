//! The agent command set: explicit action values executed against the shared
//! world context.
//!
//! Every variant names the acting entity and carries its operands by value,
//! so a queued command stays inspectable until the moment it runs. Commands
//! touch the store and ledger only through their locks and report what
//! happened into the outcome log for the fitness shaper.

use crate::fsm::Command;
use crate::grid::NodeId;
use crate::world::{ActionOutcome, World};
use glam::Vec2;
use vivarium_data::{Energy, EntityId, Health, Heading, Position};

const KILL_ENERGY_REWARD: f32 = 0.5;

/// One world-mutating action issued by a state behaviour.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    /// Blends the entity's heading toward `direction` by `weight`.
    Steer {
        id: EntityId,
        direction: Vec2,
        weight: f32,
    },
    /// Advances along the current heading at `speed`; `toward` is where the
    /// entity was trying to go, kept for outcome scoring.
    Advance {
        id: EntityId,
        speed: f32,
        toward: Vec2,
    },
    /// Withdraws up to `amount` from a resource node into the entity's
    /// energy reserve.
    Consume {
        id: EntityId,
        node: NodeId,
        amount: f32,
    },
    /// Deals `damage` to `target`. Must run in a sequential bucket so two
    /// simultaneous killing blows cannot both claim the kill.
    Strike {
        id: EntityId,
        target: EntityId,
        damage: f32,
    },
    /// Moves directly away from `from` at `speed`.
    Flee {
        id: EntityId,
        from: Vec2,
        speed: f32,
    },
    /// Steers with the group: `cohesion` points at the flock centroid,
    /// `separation` away from the nearest mate, `alignment` along the mate's
    /// heading. The issuing behaviour scales each vector by the flocking
    /// brain's gains before queueing.
    Flock {
        id: EntityId,
        cohesion: Vec2,
        separation: Vec2,
        alignment: Vec2,
    },
}

impl AgentCommand {
    fn steer(ctx: &World, id: EntityId, direction: Vec2, weight: f32) {
        let Some(direction) = direction.try_normalize() else {
            return;
        };
        let _ = ctx.store.with_component_mut::<Heading, _>(id, |heading| {
            let blended = heading.0.lerp(direction, weight.clamp(0.0, 1.0));
            heading.0 = blended.try_normalize().unwrap_or(heading.0);
        });
    }

    fn advance(ctx: &World, id: EntityId, speed: f32, toward: Vec2) {
        let Ok(heading) = ctx.store.get_component::<Heading>(id) else {
            return;
        };
        let moved = ctx
            .store
            .with_component_mut::<Position, _>(id, |position| {
                let next = position.0 + heading.0 * speed;
                if ctx.grid.is_within_bounds(next) {
                    position.0 = next;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if moved {
            ctx.outcomes.record(ActionOutcome::Moved {
                id,
                heading: heading.0,
                toward,
            });
        }
    }

    fn consume(ctx: &World, id: EntityId, node: NodeId, amount: f32) {
        let taken = ctx.resources.withdraw(node, amount);
        if taken > 0.0 {
            let _ = ctx
                .store
                .with_component_mut::<Energy, _>(id, |energy| energy.0 += taken);
            ctx.outcomes.record(ActionOutcome::Ate { id, amount: taken });
        } else {
            ctx.outcomes.record(ActionOutcome::SoughtFood {
                id,
                progressed: false,
            });
        }
    }

    fn strike(ctx: &World, id: EntityId, target: EntityId, damage: f32) {
        let killed = ctx
            .store
            .with_component_mut::<Health, _>(target, |health| {
                health.0 -= damage;
                if health.0 <= 0.0 {
                    // populations stay fixed across a generation: a kill
                    // respawns the victim at full health rather than
                    // destroying it
                    *health = Health::default();
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if killed {
            let _ = ctx
                .store
                .with_component_mut::<Energy, _>(id, |energy| energy.0 += KILL_ENERGY_REWARD);
        }
        ctx.outcomes.record(ActionOutcome::DealtDamage {
            id,
            target,
            amount: damage,
            killed,
        });
        ctx.outcomes.record(ActionOutcome::TookDamage {
            id: target,
            amount: damage,
        });
    }

    fn flee(ctx: &World, id: EntityId, from: Vec2, speed: f32) {
        let gained = ctx
            .store
            .with_component_mut::<Position, _>(id, |position| {
                let Some(away) = (position.0 - from).try_normalize() else {
                    return false;
                };
                let next = position.0 + away * speed;
                if ctx.grid.is_within_bounds(next) {
                    position.0 = next;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if gained {
            if let Ok(position) = ctx.store.get_component::<Position>(id) {
                let _ = ctx.store.with_component_mut::<Heading, _>(id, |heading| {
                    if let Some(away) = (position.0 - from).try_normalize() {
                        heading.0 = away;
                    }
                });
            }
        }
        ctx.outcomes.record(ActionOutcome::Escaped {
            id,
            gained_distance: gained,
        });
    }

    fn flock(ctx: &World, id: EntityId, cohesion: Vec2, separation: Vec2, alignment: Vec2) {
        let steer = cohesion * 0.4 + separation * 0.4 + alignment * 0.2;
        Self::steer(ctx, id, steer, 0.5);
        let aligned = match (
            ctx.store.get_component::<Heading>(id),
            alignment.try_normalize(),
        ) {
            (Ok(heading), Some(mate)) => heading.0.dot(mate),
            _ => 0.0,
        };
        ctx.outcomes.record(ActionOutcome::Flocked {
            id,
            cohesion: cohesion.length(),
            separation: separation.length(),
            alignment: aligned,
        });
    }
}

impl Command for AgentCommand {
    type Ctx = World;

    fn execute(&self, ctx: &World) {
        match *self {
            AgentCommand::Steer {
                id,
                direction,
                weight,
            } => Self::steer(ctx, id, direction, weight),
            AgentCommand::Advance { id, speed, toward } => Self::advance(ctx, id, speed, toward),
            AgentCommand::Consume { id, node, amount } => Self::consume(ctx, id, node, amount),
            AgentCommand::Strike { id, target, damage } => Self::strike(ctx, id, target, damage),
            AgentCommand::Flee { id, from, speed } => Self::flee(ctx, id, from, speed),
            AgentCommand::Flock {
                id,
                cohesion,
                separation,
                alignment,
            } => Self::flock(ctx, id, cohesion, separation, alignment),
        }
    }
}
