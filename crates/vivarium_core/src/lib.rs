//! Simulation core: behaviour machines, component storage, neural brains,
//! and the genetic algorithm that evolves them.
//!
//! The crate is organized around one [`world::World`] context passed by
//! reference into every system. [`simulation::Simulation`] owns the tick
//! loop; everything else is a building block it composes.

pub mod brain;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fitness;
pub mod fsm;
pub mod genetics;
pub mod grid;
pub mod metrics;
pub mod persistence;
pub mod simulation;
pub mod species;
pub mod store;
pub mod world;

pub use config::AppConfig;
pub use error::CoreError;
pub use simulation::{DefaultSensors, SensorWiring, Simulation};
pub use world::World;
