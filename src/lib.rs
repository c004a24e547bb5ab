//! Headless runner around the simulation core: a self-contained demo grid
//! plus the generation loop the binary drives.

pub mod grid;
pub mod runner;
