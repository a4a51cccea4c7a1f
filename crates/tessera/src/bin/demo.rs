//! # Tessera Demo
//!
//! Headless run of the sample systems over a swarm of entities.
//!
//! ```bash
//! # Defaults
//! ./tessera_demo
//!
//! # From a TOML file, with debug logging
//! RUST_LOG=tessera=debug ./tessera_demo demo.toml
//! ```

use std::process::ExitCode;

use tessera::{Simulation, SimulationConfig};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match SimulationConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %path, "failed to load configuration: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };

    let mut simulation = match Simulation::new(config) {
        Ok(simulation) => simulation,
        Err(e) => {
            tracing::error!(code = ?e.code(), "setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stats = simulation.run();
    println!(
        "ticks: {}  alive: {}  reaped: {}  update time: {:?}",
        stats.ticks, stats.alive, stats.reaped, stats.elapsed
    );
    ExitCode::SUCCESS
}
