//! # Simulation Loop
//!
//! Fixed-step driver for the sample systems:
//!
//! ```text
//! setup:  registry -> SWARM pool -> systems -> entities
//! tick:   Movement -> Decay -> Reaper
//! ```
//!
//! Configuration is TOML, with the registry settings nested under `[manager]`:
//!
//! ```toml
//! entities = 1000
//! ticks = 120
//! delta_time = 0.016
//! max_health = 60
//!
//! [manager]
//! max_component_kinds = 16
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tessera_core::{EcsError, EcsResult, EntityPool, Manager, ManagerConfig};

use crate::components::{Health, Position, Velocity};
use crate::systems::{DecaySystem, MovementSystem, ReaperSystem};

/// Pool holding the simulated entities.
pub const SWARM_POOL: &str = "SWARM";

/// Configuration for a simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Registry settings.
    pub manager: ManagerConfig,
    /// Number of entities spawned into the swarm pool.
    pub entities: usize,
    /// Number of ticks `run` performs.
    pub ticks: u32,
    /// Seconds per tick.
    pub delta_time: f32,
    /// Spawned health cycles through `1..=max_health`.
    pub max_health: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            entities: 1_000,
            ticks: 120,
            delta_time: 1.0 / 60.0,
            max_health: 60,
        }
    }
}

impl SimulationConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed input or out-of-range values.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks the value ranges, including the nested registry settings.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] for a zero entity count, a
    /// non-positive health ceiling or a non-finite time step.
    pub fn validate(&self) -> EcsResult<()> {
        self.manager.validate()?;
        if self.entities == 0 {
            return Err(EcsError::InvalidConfig(
                "entities must be greater than zero".to_string(),
            ));
        }
        if self.max_health <= 0 {
            return Err(EcsError::InvalidConfig(format!(
                "max_health must be positive, got {}",
                self.max_health
            )));
        }
        if !self.delta_time.is_finite() || self.delta_time < 0.0 {
            return Err(EcsError::InvalidConfig(format!(
                "delta_time must be finite and non-negative, got {}",
                self.delta_time
            )));
        }
        Ok(())
    }
}

/// Outcome of a run.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulationStats {
    /// Ticks performed so far.
    pub ticks: u64,
    /// Entities still alive in the swarm pool.
    pub alive: usize,
    /// Entities killed by the reaper.
    pub reaped: usize,
    /// Wall time spent inside `update`.
    pub elapsed: Duration,
}

/// A populated registry plus its tick counter.
#[derive(Debug)]
pub struct Simulation {
    manager: Manager,
    config: SimulationConfig,
    tick: u64,
    elapsed: Duration,
}

impl Simulation {
    /// Builds the registry, registers the sample systems and spawns the swarm.
    ///
    /// # Errors
    ///
    /// Returns the first registry error hit during setup.
    pub fn new(config: SimulationConfig) -> EcsResult<Self> {
        config.validate()?;
        let mut manager = Manager::with_config(config.manager.clone())?;
        manager.create_entity_pool(SWARM_POOL, config.entities)?;

        manager.create_system(MovementSystem)?;
        if let Some(mut editor) = manager.system_mut::<MovementSystem>() {
            editor.require::<Position>()?;
            editor.require::<Velocity>()?;
            editor.add_pool(SWARM_POOL);
        }
        manager.create_system(DecaySystem::default())?;
        if let Some(mut editor) = manager.system_mut::<DecaySystem>() {
            editor.require::<Health>()?;
            editor.add_pool(SWARM_POOL);
        }
        manager.create_system(ReaperSystem::default())?;
        if let Some(mut editor) = manager.system_mut::<ReaperSystem>() {
            editor.require::<Health>()?;
            editor.add_pool(SWARM_POOL);
        }

        for i in 0..config.entities {
            let entity = manager.create_entity_in(SWARM_POOL)?;
            let f = i as f32;
            manager.add_component(entity, Position::new(f, 0.0))?;
            manager.add_component(entity, Velocity::new((i % 7) as f32 - 3.0, 1.0))?;
            manager.add_component(entity, Health(1 + (i as i32).rem_euclid(config.max_health)))?;
        }
        tracing::info!(entities = config.entities, "simulation ready");

        Ok(Self {
            manager,
            config,
            tick: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// The registry being simulated.
    #[inline]
    #[must_use]
    pub const fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Mutable access to the registry.
    #[inline]
    pub fn manager_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }

    /// Runs one tick.
    pub fn step(&mut self) {
        let start = Instant::now();
        self.manager.update(self.config.delta_time);
        self.elapsed += start.elapsed();
        self.tick += 1;
        tracing::debug!(tick = self.tick, alive = self.alive(), "tick complete");
    }

    /// Runs the configured number of ticks, stopping early once the swarm is gone.
    pub fn run(&mut self) -> SimulationStats {
        for _ in 0..self.config.ticks {
            if self.alive() == 0 {
                break;
            }
            self.step();
        }
        let stats = self.stats();
        tracing::info!(
            ticks = stats.ticks,
            alive = stats.alive,
            reaped = stats.reaped,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "simulation finished"
        );
        stats
    }

    fn alive(&self) -> usize {
        self.manager
            .entity_pool(SWARM_POOL)
            .map_or(0, EntityPool::alive_count)
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            ticks: self.tick,
            alive: self.alive(),
            reaped: self
                .manager
                .system_logic::<ReaperSystem>()
                .map_or(0, |reaper| reaper.reaped),
            elapsed: self.elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SimulationConfig {
        SimulationConfig {
            entities: 10,
            ticks: 2,
            max_health: 5,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_setup_spawns_swarm() {
        let sim = Simulation::new(small()).unwrap();
        assert_eq!(sim.stats().alive, 10);
        assert_eq!(sim.manager().entity_pool(SWARM_POOL).unwrap().capacity(), 16);
        assert_eq!(sim.manager().system_update_order().len(), 3);
    }

    #[test]
    fn test_run_reaps_lowest_health_first() {
        let mut sim = Simulation::new(small()).unwrap();
        let stats = sim.run();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.reaped, 4);
        assert_eq!(stats.alive, 6);
        assert_eq!(sim.manager().component_count::<Health>(), 6);
    }

    #[test]
    fn test_run_stops_when_swarm_is_gone() {
        let mut sim = Simulation::new(SimulationConfig {
            ticks: 100,
            ..small()
        })
        .unwrap();
        let stats = sim.run();
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.alive, 0);
        assert_eq!(stats.reaped, 10);
    }

    #[test]
    fn test_toml_config() {
        let config = SimulationConfig::from_toml_str(
            "entities = 4\nticks = 3\n\n[manager]\nmax_component_kinds = 8\n",
        )
        .unwrap();
        assert_eq!(config.entities, 4);
        assert_eq!(config.manager.max_component_kinds, 8);
        assert!(SimulationConfig::from_toml_str("max_health = 0").is_err());
        assert!(SimulationConfig::from_toml_str("[manager]\nmax_component_kinds = 0").is_err());
    }

    #[test]
    fn test_too_few_kinds_fails_setup() {
        let mut config = small();
        config.manager.max_component_kinds = 2;
        assert_eq!(
            Simulation::new(config).err(),
            Some(EcsError::ComponentKindLimit { max: 2 })
        );
    }
}
