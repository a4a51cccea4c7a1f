//! # Tessera
//!
//! Sample components and systems built on [`tessera_core`], and a headless
//! [`Simulation`] that drives them.
//!
//! ## Modules
//!
//! - `components`: plain data attached to entities
//! - `systems`: per-tick logic over those components
//! - `simulation`: world setup and the fixed-step tick loop

pub mod components;
pub mod simulation;
pub mod systems;

// Re-export the registry
pub use tessera_core as core;

pub use components::{Health, Position, Velocity};
pub use simulation::{Simulation, SimulationConfig, SimulationStats};
pub use systems::{DecaySystem, MovementSystem, ReaperSystem};
