//! # Registry Configuration
//!
//! Startup settings for a [`Manager`](crate::Manager). Loaded once, either
//! built in code or read from a TOML file:
//!
//! ```toml
//! default_pool_capacity = 4096
//! max_component_kinds = 64
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::SIGNATURE_BITS;
use crate::error::{EcsError, EcsResult};
use crate::memory::{normalize_capacity, MAX_POOL_CAPACITY};

/// Name of the entity pool every manager owns. Reserved.
pub const DEFAULT_POOL_NAME: &str = "DEFAULT";

/// Default capacity of an entity pool.
pub const DEFAULT_POOL_CAPACITY: usize = 2048;

/// Default number of distinct component kinds.
pub const DEFAULT_MAX_COMPONENT_KINDS: usize = SIGNATURE_BITS;

/// Configuration for the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Capacity of the default entity pool. Rounded up to a power of two.
    pub default_pool_capacity: usize,
    /// Maximum number of distinct component kinds (at most [`SIGNATURE_BITS`]).
    pub max_component_kinds: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_pool_capacity: DEFAULT_POOL_CAPACITY,
            max_component_kinds: DEFAULT_MAX_COMPONENT_KINDS,
        }
    }
}

impl ManagerConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the text is not valid TOML for
    /// this schema or fails [`validate`](Self::validate).
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

    /// Checks the value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] when the pool capacity is zero or
    /// rounds past [`MAX_POOL_CAPACITY`], or when the kind limit is zero or
    /// wider than a signature.
    pub fn validate(&self) -> EcsResult<()> {
        if normalize_capacity(self.default_pool_capacity).is_none() {
            return Err(EcsError::InvalidConfig(format!(
                "default_pool_capacity must be in 1..={MAX_POOL_CAPACITY}, got {}",
                self.default_pool_capacity
            )));
        }
        if self.max_component_kinds == 0 || self.max_component_kinds > SIGNATURE_BITS {
            return Err(EcsError::InvalidConfig(format!(
                "max_component_kinds must be in 1..={SIGNATURE_BITS}, got {}",
                self.max_component_kinds
            )));
        }
        Ok(())
    }
}
