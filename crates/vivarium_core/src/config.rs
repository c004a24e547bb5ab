//! Configuration management for simulation parameters.
//!
//! Strongly-typed structures mapping to `config.toml`. Defaults are hardcoded
//! in the `Default` impls; a config file overrides them field by field.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [world]
//! width = 200.0
//! height = 120.0
//! herbivores = 40
//! seed = 42
//!
//! [evolution]
//! elite_count = 2
//! crossover = "Uniform"
//!
//! [schedule]
//! generation_ticks = 500
//! ```

use crate::genetics::CrossoverStrategy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// World-level simulation configuration: dimensions, populations, food.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub carnivores: usize,
    pub herbivores: usize,
    pub scavengers: usize,
    pub food_nodes: usize,
    pub food_stock: f32,
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 120.0,
            carnivores: 10,
            herbivores: 40,
            scavengers: 15,
            food_nodes: 30,
            food_stock: 25.0,
            seed: None,
        }
    }
}

/// Genetic algorithm configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvolutionConfig {
    pub elite_count: usize,
    pub crossover: CrossoverStrategy,
    pub mutation_rate: f32,
    pub mutation_amount: f32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            elite_count: 2,
            crossover: CrossoverStrategy::Uniform,
            mutation_rate: 0.05,
            mutation_amount: 0.3,
        }
    }
}

/// Fitness shaping bases and world-predicate thresholds.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FitnessConfig {
    pub reward_base: f32,
    pub punishment_base: f32,
    /// Forward-direction alignment threshold (dot product, ~25.8 degrees).
    pub alignment_dot: f32,
    pub cohesion_max: f32,
    pub separation_min: f32,
    pub alignment_min: f32,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            reward_base: 1.0,
            punishment_base: 1.05,
            alignment_dot: 0.9,
            cohesion_max: 8.0,
            separation_min: 1.5,
            alignment_min: 0.5,
        }
    }
}

/// Tick scheduling and worker-pool configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScheduleConfig {
    /// Ticks between stop-the-world genetic epochs.
    pub generation_ticks: u64,
    /// Bounded degree of parallelism for the FSM parallel buckets.
    pub max_parallel_actions: usize,
    /// Structured log line every N ticks.
    pub log_interval: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            generation_ticks: 500,
            max_parallel_actions: 32,
            log_interval: 100,
        }
    }
}

/// Aggregated application configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub fitness: FitnessConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = AppConfig::default();
        assert!(config.world.herbivores > 0);
        assert!(config.schedule.generation_ticks > 0);
        assert!(config.fitness.alignment_dot > 0.0 && config.fitness.alignment_dot < 1.0);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let raw = r#"
            [world]
            width = 50.0
            height = 50.0
            carnivores = 3
            herbivores = 5
            scavengers = 2
            food_nodes = 4
            food_stock = 10.0

            [schedule]
            generation_ticks = 20
            max_parallel_actions = 8
            log_interval = 10
        "#;
        let config: AppConfig = toml::from_str(raw).expect("valid toml");
        assert_eq!(config.world.carnivores, 3);
        assert_eq!(config.schedule.generation_ticks, 20);
        // untouched section keeps its defaults
        assert_eq!(config.evolution.elite_count, 2);
    }
}
