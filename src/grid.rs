//! Self-contained world grid for headless runs.
//!
//! Resource nodes are placed once at startup; entity positions are mirrored
//! from the component store before each tick so nearest-entity queries stay
//! brute-force simple. Suitable for the stock population sizes, not tuned
//! for huge ones.

use glam::Vec2;
use rand::Rng;
use std::sync::RwLock;
use vivarium_core::config::WorldConfig;
use vivarium_core::grid::{GridNode, NodeId, NodeKind, WorldGrid};
use vivarium_core::World;
use vivarium_data::{Alive, EntityId, Position, SpeciesTag, SpeciesType};

pub struct DemoGrid {
    half_width: f32,
    half_height: f32,
    nodes: Vec<GridNode>,
    mirror: RwLock<Vec<(EntityId, Vec2, SpeciesType)>>,
}

impl DemoGrid {
    /// Places the configured number of food nodes, plus a smaller ring of
    /// carrion sites for the meat-eating species.
    pub fn generate_with_rng<R: Rng>(config: &WorldConfig, rng: &mut R) -> Self {
        let half_width = config.width / 2.0;
        let half_height = config.height / 2.0;
        let mut nodes = Vec::new();
        let mut place = |kind: NodeKind, count: usize, nodes: &mut Vec<GridNode>, rng: &mut R| {
            for _ in 0..count {
                let id = NodeId(nodes.len() as u64);
                nodes.push(GridNode {
                    id,
                    kind,
                    position: Vec2::new(
                        rng.gen_range(-half_width..half_width),
                        rng.gen_range(-half_height..half_height),
                    ),
                });
            }
        };
        place(NodeKind::Food, config.food_nodes, &mut nodes, rng);
        place(
            NodeKind::Carrion,
            (config.food_nodes / 3).max(1),
            &mut nodes,
            rng,
        );

        Self {
            half_width,
            half_height,
            nodes,
            mirror: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    /// Refreshes the entity-position mirror from the store. Only entities
    /// carrying the `Alive` flag are mirrored, so nearest-entity queries
    /// never target a half-spawned record. Call once per tick, before the
    /// simulation tick.
    pub fn sync(&self, world: &World) {
        let positions = world.store.components::<Position>();
        let tags = world.store.components::<SpeciesTag>();
        let alive = world.store.flags::<Alive>();
        let mut fresh = Vec::with_capacity(positions.len());
        for (id, position) in positions {
            if !alive.contains(&id) {
                continue;
            }
            if let Some(tag) = tags.get(&id) {
                fresh.push((id, position.0, tag.0));
            }
        }
        *self.mirror.write().unwrap_or_else(|e| e.into_inner()) = fresh;
    }
}

impl WorldGrid for DemoGrid {
    fn nearest_node(&self, kind: NodeKind, position: Vec2) -> Option<GridNode> {
        self.nodes
            .iter()
            .filter(|n| n.kind == kind)
            .min_by(|a, b| {
                position
                    .distance_squared(a.position)
                    .partial_cmp(&position.distance_squared(b.position))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }

    fn nearest_entity(&self, species: SpeciesType, position: Vec2) -> Option<(EntityId, Vec2)> {
        self.mirror
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, _, s)| *s == species)
            .min_by(|a, b| {
                position
                    .distance_squared(a.1)
                    .partial_cmp(&position.distance_squared(b.1))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(id, pos, _)| (*id, *pos))
    }

    fn is_within_bounds(&self, position: Vec2) -> bool {
        position.x.abs() <= self.half_width && position.y.abs() <= self.half_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid() -> DemoGrid {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        DemoGrid::generate_with_rng(&WorldConfig::default(), &mut rng)
    }

    #[test]
    fn test_generated_nodes_lie_within_bounds() {
        let grid = grid();
        assert!(!grid.nodes().is_empty());
        for node in grid.nodes() {
            assert!(grid.is_within_bounds(node.position));
        }
        assert!(grid
            .nodes()
            .iter()
            .any(|n| n.kind == NodeKind::Carrion));
    }

    #[test]
    fn test_nearest_node_picks_the_closest_of_its_kind() {
        let grid = grid();
        let probe = Vec2::new(10.0, -5.0);
        let nearest = grid.nearest_node(NodeKind::Food, probe).expect("has food");
        for node in grid.nodes().iter().filter(|n| n.kind == NodeKind::Food) {
            assert!(probe.distance(nearest.position) <= probe.distance(node.position));
        }
    }

    #[test]
    fn test_sync_mirrors_only_alive_flagged_entities() {
        use std::sync::Arc;
        use vivarium_core::AppConfig;

        let world = World::new(&AppConfig::default(), Arc::new(grid())).expect("world");
        let marked = world.store.create_entity();
        world.store.add_component(marked, Position(Vec2::new(3.0, 0.0)));
        world.store.add_component(marked, SpeciesTag(SpeciesType::Herbivore));
        world.store.add_flag::<Alive>(marked);
        // closer to the probe, but never flagged alive
        let unmarked = world.store.create_entity();
        world.store.add_component(unmarked, Position(Vec2::new(0.5, 0.0)));
        world
            .store
            .add_component(unmarked, SpeciesTag(SpeciesType::Herbivore));

        let grid = grid();
        grid.sync(&world);
        let (id, _) = grid
            .nearest_entity(SpeciesType::Herbivore, Vec2::ZERO)
            .expect("mirror populated");
        assert_eq!(id, marked);
    }

    #[test]
    fn test_nearest_entity_reads_the_synced_mirror() {
        let grid = grid();
        assert!(grid
            .nearest_entity(SpeciesType::Herbivore, Vec2::ZERO)
            .is_none());

        *grid.mirror.write().unwrap() = vec![
            (EntityId(1), Vec2::new(5.0, 0.0), SpeciesType::Herbivore),
            (EntityId(2), Vec2::new(1.0, 0.0), SpeciesType::Herbivore),
            (EntityId(3), Vec2::new(0.5, 0.0), SpeciesType::Carnivore),
        ];
        let (id, _) = grid
            .nearest_entity(SpeciesType::Herbivore, Vec2::ZERO)
            .expect("mirror populated");
        assert_eq!(id, EntityId(2));
    }
}
