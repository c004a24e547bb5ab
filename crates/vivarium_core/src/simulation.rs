//! Top-level simulation driver: spawning, the tick loop, and the
//! stop-the-world generational step.
//!
//! A tick runs in fixed phases: sensors fill each entity's brain inputs, the
//! evaluator runs every forward pass in parallel, every agent machine ticks
//! on the worker pool, and the fitness shaper folds the drained outcome log
//! into the score board. Nothing from a later phase overlaps an earlier one.

use crate::brain::genome::{flatten, to_genome, unflatten};
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::evaluator::{evaluate_population, BrainSet};
use crate::fitness::{BrainScore, FitnessShaper};
use crate::fsm::{BehaviourParam, StateBehaviour, StateMachine};
use crate::genetics::GeneticAlgorithm;
use crate::grid::{NodeKind, WorldGrid};
use crate::species::behaviour::{
    flock_vectors, AttackBehaviour, EatBehaviour, EscapeBehaviour, WalkBehaviour, SAFE_RADIUS,
    SATED_THRESHOLD,
};
use crate::species::{profile, topology_for, AgentCommand};
use crate::world::World;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use vivarium_data::{
    Alive, BehaviourState, Boid, BrainInputs, BrainOutputs, BrainSnapshot, BrainType, Energy,
    EntityId, Heading, Health, Hunted, Position, SpeciesTag, SpeciesType, StimulusFlag,
};

const SPAWN_ENERGY: f32 = 5.0;
const WALK_SPEED: f32 = 1.0;
const FORAGE_SPEED: f32 = 1.2;
const HUNT_SPEED: f32 = 1.5;
const FLEE_SPEED: f32 = 1.8;
const STRIKE_DAMAGE: f32 = 0.34;
const BITE_AMOUNT: f32 = 1.0;

/// One agent's behaviour machine.
pub type AgentFsm = StateMachine<BehaviourState, StimulusFlag, AgentCommand>;

/// Fills one entity's brain input channels from world state. The wiring is a
/// collaborator so experiments can swap sensor layouts without touching the
/// tick loop.
pub trait SensorWiring: Send + Sync {
    fn sense(&self, world: &World, id: EntityId, species: SpeciesType) -> BrainInputs;
}

/// Stock sensor layout matching the declared brain topologies.
pub struct DefaultSensors;

impl DefaultSensors {
    fn toward(from: Vec2, to: Option<Vec2>) -> Vec2 {
        to.map(|t| (t - from).normalize_or_zero()).unwrap_or(Vec2::ZERO)
    }
}

impl SensorWiring for DefaultSensors {
    fn sense(&self, world: &World, id: EntityId, species: SpeciesType) -> BrainInputs {
        let mut inputs = BrainInputs::default();
        let Ok(position) = world.store.get_component::<Position>(id) else {
            return inputs;
        };
        let position = position.0;
        let heading = world
            .store
            .get_component::<Heading>(id)
            .map(|h| h.0)
            .unwrap_or(Vec2::X);
        let energy = world
            .store
            .get_component::<Energy>(id)
            .map(|e| e.0)
            .unwrap_or(0.0);

        let spec = profile(species);
        let food_kind = match species {
            SpeciesType::Herbivore => NodeKind::Food,
            _ => NodeKind::Carrion,
        };
        let food = world
            .grid
            .nearest_node(food_kind, position)
            .map(|n| n.position);
        let food_dir = Self::toward(position, food);

        for &brain in spec.brains {
            let channel = match brain {
                BrainType::Movement => {
                    vec![food_dir.x, food_dir.y, heading.x, heading.y]
                }
                BrainType::Eating => {
                    let hunger = (1.0 - energy / SATED_THRESHOLD).clamp(0.0, 1.0);
                    vec![hunger, food_dir.x, food_dir.y]
                }
                BrainType::Combat => {
                    let threat = spec
                        .predator
                        .or(spec.prey)
                        .and_then(|s| world.grid.nearest_entity(s, position))
                        .filter(|(other, _)| *other != id)
                        .map(|(_, pos)| pos);
                    let dir = Self::toward(position, threat);
                    let distance = threat
                        .map(|t| (position.distance(t) / SAFE_RADIUS).clamp(0.0, 1.0))
                        .unwrap_or(1.0);
                    let health = world
                        .store
                        .get_component::<Health>(id)
                        .map(|h| h.0)
                        .unwrap_or(0.0);
                    // the hunted marker tells the combat brain it is mid-flight
                    let hunted = if world.store.has_flag::<Hunted>(id) {
                        1.0
                    } else {
                        0.0
                    };
                    vec![dir.x, dir.y, health, distance, hunted]
                }
                BrainType::Flocking => {
                    let (cohesion, separation, alignment) =
                        flock_vectors(world, id, species).unwrap_or((
                            Vec2::ZERO,
                            Vec2::ZERO,
                            heading,
                        ));
                    vec![
                        cohesion.x,
                        cohesion.y,
                        separation.x,
                        separation.y,
                        alignment.x,
                        alignment.y,
                    ]
                }
            };
            inputs.channels.insert(brain, channel);
        }
        inputs
    }
}

/// The running simulation: world context, per-agent machines and brains, and
/// the evolutionary bookkeeping between generations.
pub struct Simulation {
    pub world: World,
    config: AppConfig,
    sensors: Box<dyn SensorWiring>,
    fsms: HashMap<EntityId, Mutex<AgentFsm>>,
    brains: HashMap<EntityId, BrainSet>,
    scores: HashMap<(EntityId, BrainType), BrainScore>,
    species_of: HashMap<EntityId, SpeciesType>,
    shaper: FitnessShaper,
    ga: GeneticAlgorithm,
    rng: ChaCha8Rng,
    tick: u64,
    generation: u64,
}

impl Simulation {
    pub fn new(
        config: AppConfig,
        grid: Arc<dyn WorldGrid>,
        sensors: Box<dyn SensorWiring>,
    ) -> anyhow::Result<Self> {
        let world = World::new(&config, grid)?;
        let rng = match config.world.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let shaper = FitnessShaper::new(config.fitness.clone());
        let ga = GeneticAlgorithm {
            elite_count: config.evolution.elite_count,
            strategy: config.evolution.crossover,
            mutation_rate: config.evolution.mutation_rate,
            mutation_amount: config.evolution.mutation_amount,
        };
        Ok(Self {
            world,
            config,
            sensors,
            fsms: HashMap::new(),
            brains: HashMap::new(),
            scores: HashMap::new(),
            species_of: HashMap::new(),
            shaper,
            ga,
            rng,
            tick: 0,
            generation: 0,
        })
    }

    /// Spawns the configured starting populations.
    pub fn spawn_population(&mut self) -> Result<(), CoreError> {
        let counts = [
            (SpeciesType::Carnivore, self.config.world.carnivores),
            (SpeciesType::Herbivore, self.config.world.herbivores),
            (SpeciesType::Scavenger, self.config.world.scavengers),
        ];
        for (species, count) in counts {
            for _ in 0..count {
                self.spawn_agent(species)?;
            }
        }
        tracing::info!(agents = self.fsms.len(), "population spawned");
        Ok(())
    }

    /// Spawns one agent: components, randomly initialized brains, and a
    /// fully wired behaviour machine starting in the walk state.
    pub fn spawn_agent(&mut self, species: SpeciesType) -> Result<EntityId, CoreError> {
        let id = self.world.store.create_entity();
        let half_w = self.config.world.width / 2.0;
        let half_h = self.config.world.height / 2.0;
        let position = Vec2::new(
            self.rng.gen_range(-half_w..half_w),
            self.rng.gen_range(-half_h..half_h),
        );
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);

        self.world.store.add_component(id, Position(position));
        self.world
            .store
            .add_component(id, Heading(Vec2::from_angle(angle)));
        self.world.store.add_component(id, Energy(SPAWN_ENERGY));
        self.world.store.add_component(id, Health::default());
        self.world.store.add_component(id, SpeciesTag(species));
        self.world.store.add_component(id, BrainInputs::default());
        self.world.store.add_component(id, BrainOutputs::default());
        self.world.store.add_flag::<Alive>(id);
        if species == SpeciesType::Herbivore {
            self.world.store.add_flag::<Boid>(id);
        }

        let spec = profile(species);
        let mut set = BrainSet::new();
        for &brain in spec.brains {
            let topology = topology_for(species, brain)?;
            set.insert(brain, topology.build_random_with_rng(&mut self.rng));
        }
        self.brains.insert(id, set);
        self.species_of.insert(id, species);

        let mut fsm = self.build_fsm(id, species)?;
        fsm.force_transition(BehaviourState::Walk, &self.world);
        self.fsms.insert(id, Mutex::new(fsm));
        Ok(id)
    }

    fn build_fsm(&self, id: EntityId, species: SpeciesType) -> Result<AgentFsm, CoreError> {
        let mut fsm = AgentFsm::new(self.world.pool.clone())?;
        let spec = profile(species);

        for &state in spec.states {
            let brain = driving_brain(species, state);
            let params = move |ctx: &World| -> Vec<BehaviourParam> {
                vec![
                    BehaviourParam::Entity(id),
                    BehaviourParam::Species(species),
                    BehaviourParam::Vector(steer_from_outputs(ctx, id, brain)),
                ]
            };
            match state {
                BehaviourState::Walk => fsm.add_behaviour(
                    state,
                    StateBehaviour::new(WalkBehaviour { speed: WALK_SPEED }, params),
                ),
                BehaviourState::Eat => fsm.add_behaviour(
                    state,
                    StateBehaviour::new(
                        EatBehaviour {
                            kind: match species {
                                SpeciesType::Herbivore => NodeKind::Food,
                                _ => NodeKind::Carrion,
                            },
                            bite: BITE_AMOUNT,
                            speed: FORAGE_SPEED,
                        },
                        params,
                    ),
                ),
                BehaviourState::Attack => fsm.add_behaviour(
                    state,
                    StateBehaviour::new(
                        AttackBehaviour {
                            damage: STRIKE_DAMAGE,
                            speed: HUNT_SPEED,
                        },
                        params,
                    ),
                ),
                BehaviourState::Escape => fsm.add_behaviour(
                    state,
                    StateBehaviour::new(EscapeBehaviour { speed: FLEE_SPEED }, params),
                ),
            }
        }

        let has = |state: BehaviourState| spec.states.contains(&state);
        fsm.set_transition(
            BehaviourState::Walk,
            StimulusFlag::OnSearchFood,
            BehaviourState::Eat,
            None,
        );
        fsm.set_transition(
            BehaviourState::Eat,
            StimulusFlag::OnEat,
            BehaviourState::Walk,
            None,
        );
        if has(BehaviourState::Attack) {
            fsm.set_transition(
                BehaviourState::Walk,
                StimulusFlag::OnAttack,
                BehaviourState::Attack,
                None,
            );
            fsm.set_transition(
                BehaviourState::Attack,
                StimulusFlag::OnEat,
                BehaviourState::Walk,
                None,
            );
        }
        if has(BehaviourState::Escape) {
            // the hunted marker tracks flight across the whole episode
            let mark: Arc<dyn Fn(&World) + Send + Sync> =
                Arc::new(move |ctx: &World| ctx.store.add_flag::<Hunted>(id));
            let unmark: Arc<dyn Fn(&World) + Send + Sync> =
                Arc::new(move |ctx: &World| ctx.store.remove_flag::<Hunted>(id));
            for &from in spec.states {
                if from != BehaviourState::Escape {
                    fsm.set_transition(
                        from,
                        StimulusFlag::OnEscape,
                        BehaviourState::Escape,
                        Some(mark.clone()),
                    );
                }
            }
            fsm.set_transition(
                BehaviourState::Escape,
                StimulusFlag::OnEat,
                BehaviourState::Walk,
                Some(unmark),
            );
        }
        Ok(fsm)
    }

    /// Runs one full simulation tick.
    pub fn tick(&mut self) {
        let started = Instant::now();

        // phase 1: sensors
        for (&id, &species) in &self.species_of {
            let fresh = self.sensors.sense(&self.world, id, species);
            let _ = self
                .world
                .store
                .with_component_mut::<BrainInputs, _>(id, |inputs| *inputs = fresh);
        }

        // phase 2: brains
        evaluate_population(&self.world, &self.brains);

        // phase 3: behaviour machines, one per agent, across the pool
        let world = &self.world;
        self.world.pool.install(|| {
            self.fsms.par_iter().for_each(|(_, fsm)| {
                fsm.lock().unwrap_or_else(|e| e.into_inner()).tick(world);
            });
        });

        // phase 4: fitness shaping over the settled outcome log
        let outcomes = self.world.outcomes.drain();
        self.shaper
            .apply_tick(&outcomes, &self.species_of, &mut self.scores);

        self.tick += 1;
        self.world
            .metrics
            .record_tick(started.elapsed(), self.fsms.len());

        if self.tick % self.config.schedule.generation_ticks == 0 {
            self.advance_generation();
        }
    }

    /// Stop-the-world generational step: per (species, brain) group, flatten
    /// every live brain into a genome, run one genetic epoch, and hand the
    /// offspring back to the same entities.
    pub fn advance_generation(&mut self) {
        let mut groups: HashMap<(SpeciesType, BrainType), Vec<EntityId>> = HashMap::new();
        for (&id, &species) in &self.species_of {
            for &brain in profile(species).brains {
                groups.entry((species, brain)).or_default().push(id);
            }
        }

        for ((species, brain), mut members) in groups {
            members.sort();
            let genomes: Vec<_> = members
                .iter()
                .filter_map(|&id| {
                    let network = self.brains.get(&id)?.get(&brain)?;
                    let fitness = self
                        .scores
                        .get(&(id, brain))
                        .map(|s| s.fitness)
                        .unwrap_or(0.0);
                    Some(to_genome(network, fitness))
                })
                .collect();
            if genomes.is_empty() {
                continue;
            }
            let best = genomes.iter().map(|g| g.fitness).fold(f32::MIN, f32::max);
            let mean = genomes.iter().map(|g| g.fitness).sum::<f32>() / genomes.len() as f32;
            tracing::info!(
                species = ?species,
                brain = ?brain,
                best = best,
                mean = mean,
                "generation fitness"
            );

            let Ok(topology) = topology_for(species, brain) else {
                continue;
            };
            let offspring = self.ga.epoch(&genomes, members.len(), &mut self.rng);
            // zip semantics: entities past the offspring count keep their
            // old brain for another generation
            for (&id, child) in members.iter().zip(&offspring) {
                match unflatten(&child.genes, &topology) {
                    Ok(network) => {
                        if let Some(set) = self.brains.get_mut(&id) {
                            set.insert(brain, network);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(entity = %id, brain = ?brain, %error, "offspring genome rejected");
                    }
                }
            }
        }

        self.scores.clear();
        self.reset_agents();
        self.generation += 1;
        self.world.metrics.record_generation(self.generation);
        tracing::info!(generation = self.generation, "genetic epoch complete");
    }

    /// Returns every agent to spawn condition for the next generation.
    fn reset_agents(&mut self) {
        for (&id, fsm) in &self.fsms {
            let _ = self
                .world
                .store
                .with_component_mut::<Energy, _>(id, |e| e.0 = SPAWN_ENERGY);
            let _ = self
                .world
                .store
                .with_component_mut::<Health, _>(id, |h| *h = Health::default());
            self.world.store.remove_flag::<Hunted>(id);
            fsm.lock()
                .unwrap_or_else(|e| e.into_inner())
                .force_transition(BehaviourState::Walk, &self.world);
        }
    }

    /// Persistence records for every live brain.
    #[must_use]
    pub fn snapshots(&self) -> Vec<BrainSnapshot> {
        let mut records = Vec::new();
        for (&id, set) in &self.brains {
            let Some(&species) = self.species_of.get(&id) else {
                continue;
            };
            for (&brain, network) in set {
                let weights = flatten(network);
                let score = self.scores.get(&(id, brain)).copied().unwrap_or_default();
                let biases: Vec<f32> = network
                    .layers
                    .iter()
                    .flat_map(|l| l.neurons.iter().map(|n| n.bias))
                    .collect();
                let bias = biases.iter().sum::<f32>() / biases.len().max(1) as f32;
                records.push(BrainSnapshot {
                    entity_id: id,
                    species,
                    brain,
                    total_weight_count: weights.len(),
                    weights,
                    fitness: score.fitness,
                    bias,
                    extra_param: score.fitness_mod,
                });
            }
        }
        records.sort_by_key(|r| (r.entity_id, r.brain as u8));
        records
    }

    /// Replaces live brains with archived ones. Records for unknown entities
    /// or with a gene count that no longer matches the declared topology are
    /// skipped with a warning.
    pub fn restore(&mut self, snapshots: &[BrainSnapshot]) {
        for record in snapshots {
            let Some(set) = self.brains.get_mut(&record.entity_id) else {
                tracing::warn!(entity = %record.entity_id, "archived brain for unknown entity, skipping");
                continue;
            };
            let Ok(topology) = topology_for(record.species, record.brain) else {
                tracing::warn!(entity = %record.entity_id, brain = ?record.brain, "archived brain not owned by species, skipping");
                continue;
            };
            match unflatten(&record.weights, &topology) {
                Ok(network) => {
                    set.insert(record.brain, network);
                }
                Err(error) => {
                    tracing::warn!(entity = %record.entity_id, brain = ?record.brain, %error, "archived genome rejected");
                }
            }
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.fsms.len()
    }

    /// Current behaviour state of one agent, for observers and tests.
    #[must_use]
    pub fn agent_state(&self, id: EntityId) -> Option<BehaviourState> {
        self.fsms
            .get(&id)?
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current_state()
    }
}

fn driving_brain(species: SpeciesType, state: BehaviourState) -> BrainType {
    match state {
        BehaviourState::Walk => BrainType::Movement,
        BehaviourState::Eat => BrainType::Eating,
        BehaviourState::Attack => BrainType::Combat,
        BehaviourState::Escape => {
            if profile(species).brains.contains(&BrainType::Combat) {
                BrainType::Combat
            } else {
                BrainType::Movement
            }
        }
    }
}

fn steer_from_outputs(ctx: &World, id: EntityId, brain: BrainType) -> Vec2 {
    let Ok(outputs) = ctx.store.get_component::<BrainOutputs>(id) else {
        return Vec2::ZERO;
    };
    match outputs.channels.get(&brain) {
        Some(channel) if channel.len() >= 2 => Vec2::new(channel[0], channel[1]),
        _ => Vec2::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridNode, NodeId};

    /// Minimal scripted grid for driver tests: a single food node and
    /// brute-force nearest-entity over a shared position list.
    struct TestGrid {
        node: Option<GridNode>,
        entities: Mutex<Vec<(EntityId, Vec2, SpeciesType)>>,
    }

    impl WorldGrid for TestGrid {
        fn nearest_node(&self, kind: NodeKind, _position: Vec2) -> Option<GridNode> {
            self.node.filter(|n| n.kind == kind)
        }

        fn nearest_entity(&self, species: SpeciesType, position: Vec2) -> Option<(EntityId, Vec2)> {
            self.entities
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|(_, _, s)| *s == species)
                .min_by(|a, b| {
                    position
                        .distance(a.1)
                        .partial_cmp(&position.distance(b.1))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(id, pos, _)| (*id, *pos))
        }

        fn is_within_bounds(&self, position: Vec2) -> bool {
            position.x.abs() <= 200.0 && position.y.abs() <= 200.0
        }
    }

    fn small_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.world.carnivores = 2;
        config.world.herbivores = 4;
        config.world.scavengers = 2;
        config.world.seed = Some(42);
        config.schedule.generation_ticks = 5;
        config.schedule.max_parallel_actions = 4;
        config
    }

    fn simulation() -> Simulation {
        let grid = TestGrid {
            node: Some(GridNode {
                id: NodeId(0),
                kind: NodeKind::Food,
                position: Vec2::ZERO,
            }),
            entities: Mutex::new(Vec::new()),
        };
        Simulation::new(small_config(), Arc::new(grid), Box::new(DefaultSensors))
            .expect("simulation")
    }

    #[test]
    fn test_spawn_population_builds_agents_and_brains() {
        let mut sim = simulation();
        sim.spawn_population().expect("spawn");
        assert_eq!(sim.agent_count(), 8);
        assert_eq!(sim.world.store.entity_count(), 8);
        for (id, set) in &sim.brains {
            let species = sim.species_of[id];
            assert_eq!(set.len(), profile(species).brains.len());
            assert_eq!(sim.agent_state(*id), Some(BehaviourState::Walk));
        }
    }

    #[test]
    fn test_tick_advances_and_writes_outputs() {
        let mut sim = simulation();
        sim.spawn_population().expect("spawn");
        sim.tick();
        assert_eq!(sim.tick_count(), 1);
        assert!(sim.world.outcomes.is_empty(), "log drained after shaping");
        for &id in sim.brains.keys() {
            let outputs = sim.world.store.get_component::<BrainOutputs>(id).unwrap();
            assert!(!outputs.channels.is_empty());
        }
    }

    #[test]
    fn test_combat_sensor_reports_the_hunted_marker() {
        let grid = TestGrid {
            node: None,
            entities: Mutex::new(Vec::new()),
        };
        let world = World::new(&small_config(), Arc::new(grid)).expect("world");
        let id = world.store.create_entity();
        world.store.add_component(id, Position::default());
        world.store.add_component(id, Heading::default());
        world.store.add_component(id, Energy(2.0));
        world.store.add_component(id, Health::default());

        let calm = DefaultSensors.sense(&world, id, SpeciesType::Carnivore);
        assert_eq!(calm.channels[&BrainType::Combat][4], 0.0);

        world.store.add_flag::<Hunted>(id);
        let fleeing = DefaultSensors.sense(&world, id, SpeciesType::Carnivore);
        assert_eq!(fleeing.channels[&BrainType::Combat][4], 1.0);
    }

    #[test]
    fn test_generation_boundary_resets_scores_and_agents() {
        let mut sim = simulation();
        sim.spawn_population().expect("spawn");
        for _ in 0..5 {
            sim.tick();
        }
        assert_eq!(sim.generation(), 1);
        assert!(sim.scores.is_empty());
        for &id in sim.brains.keys() {
            assert_eq!(
                sim.world.store.get_component::<Energy>(id).unwrap().0,
                SPAWN_ENERGY
            );
            assert_eq!(sim.agent_state(id), Some(BehaviourState::Walk));
        }
    }

    #[test]
    fn test_epoch_preserves_brain_shapes() {
        let mut sim = simulation();
        sim.spawn_population().expect("spawn");
        sim.tick();
        sim.advance_generation();
        for (id, set) in &sim.brains {
            let species = sim.species_of[id];
            for (&brain, network) in set {
                let topology = topology_for(species, brain).unwrap();
                assert_eq!(flatten(network).len(), topology.gene_count());
            }
        }
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut sim = simulation();
        sim.spawn_population().expect("spawn");
        sim.tick();
        let records = sim.snapshots();
        assert!(!records.is_empty());

        // scramble every brain, then restore from the records
        let before = sim.brains.clone();
        sim.advance_generation();
        sim.restore(&records);
        assert_eq!(sim.brains, before);
    }

    #[test]
    fn test_restore_skips_unknown_entities() {
        let mut sim = simulation();
        sim.spawn_population().expect("spawn");
        let mut records = sim.snapshots();
        records[0].entity_id = EntityId(9999);
        // must not panic, the bad record is skipped
        sim.restore(&records);
    }
}
