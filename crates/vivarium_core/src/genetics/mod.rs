//! Generational genetic algorithm over flat weight vectors.

pub mod crossover;
pub mod epoch;

pub use crossover::{
    double_pivot_with_rng, single_pivot_with_rng, uniform_with_rng, CrossoverStrategy,
};
pub use epoch::{select_roulette, GeneticAlgorithm};
