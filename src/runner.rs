//! Generation loop: wires the demo grid, the simulation, and the genome
//! archive together and drives whole generations.

use crate::grid::DemoGrid;
use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::sync::Arc;
use vivarium_core::grid::NodeKind;
use vivarium_core::persistence::{GenomeArchive, JsonArchive};
use vivarium_core::simulation::DefaultSensors;
use vivarium_core::{AppConfig, Simulation};

pub struct Runner {
    pub simulation: Simulation,
    grid: Arc<DemoGrid>,
    archive: Option<JsonArchive>,
    food_stock: f32,
}

impl Runner {
    /// Builds the world, spawns the starting population, and optionally
    /// resumes brains from the newest archived generation.
    pub fn build(
        config: AppConfig,
        archive_dir: Option<&Path>,
        resume: bool,
    ) -> anyhow::Result<Self> {
        let mut rng = match config.world.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let grid = Arc::new(DemoGrid::generate_with_rng(&config.world, &mut rng));
        let food_stock = config.world.food_stock;

        let mut simulation =
            Simulation::new(config, grid.clone(), Box::new(DefaultSensors))
                .context("building simulation")?;
        simulation.spawn_population().context("spawning agents")?;

        let archive = archive_dir.map(JsonArchive::new).transpose()?;
        if resume {
            if let Some(archive) = &archive {
                if let Some((generation, snapshots)) = archive.load_latest()? {
                    tracing::info!(generation = generation, "resuming from archive");
                    simulation.restore(&snapshots);
                }
            }
        }

        let mut runner = Self {
            simulation,
            grid,
            archive,
            food_stock,
        };
        runner.replenish_resources();
        Ok(runner)
    }

    /// Tops every node's stock back up to the configured level.
    fn replenish_resources(&mut self) {
        for node in self.grid.nodes() {
            let stock = match node.kind {
                NodeKind::Food => self.food_stock,
                NodeKind::Carrion => self.food_stock / 2.0,
                NodeKind::Water => 0.0,
            };
            let current = self.simulation.world.resources.stock(node.id);
            if stock > current {
                self.simulation
                    .world
                    .resources
                    .deposit(node.id, stock - current);
            }
        }
    }

    /// Runs the given number of full generations, archiving each one.
    pub fn run(&mut self, generations: u64) -> anyhow::Result<()> {
        let target = self.simulation.generation() + generations;
        while self.simulation.generation() < target {
            let before = self.simulation.generation();
            self.grid.sync(&self.simulation.world);
            self.simulation.tick();

            if self.simulation.generation() != before {
                if let Some(archive) = &self.archive {
                    archive.save(self.simulation.generation(), &self.simulation.snapshots())?;
                }
                self.replenish_resources();
            }
        }
        tracing::info!(
            generations = generations,
            ticks = self.simulation.tick_count(),
            agents = self.simulation.agent_count(),
            "run complete"
        );
        Ok(())
    }
}
