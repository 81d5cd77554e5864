//! Engine configuration.
//!
//! All values have defaults, so a config file only needs to name what it
//! overrides. File loading lives in `conduit-data`.

use serde::{Deserialize, Serialize};

/// Default per-(node, storage type) capacity.
pub const DEFAULT_MAX_STORAGE: u64 = 6400;

/// Default number of ticks between distribution triggers.
pub const DEFAULT_DISTRIBUTION_INTERVAL: u64 = 5;

/// Default number of distribution steps the engine performs per tick.
pub const DEFAULT_STEPS_PER_TICK: usize = 64;

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity ceiling applied uniformly to every (node, storage type).
    pub max_storage: u64,
    /// A distribution pass may start on ticks divisible by this value.
    pub distribution_interval: u64,
    /// Bounded work budget per tick, shared by all running passes.
    pub steps_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_storage: DEFAULT_MAX_STORAGE,
            distribution_interval: DEFAULT_DISTRIBUTION_INTERVAL,
            steps_per_tick: DEFAULT_STEPS_PER_TICK,
        }
    }
}

impl EngineConfig {
    pub fn with_max_storage(mut self, max_storage: u64) -> Self {
        self.max_storage = max_storage;
        self
    }

    pub fn with_distribution_interval(mut self, interval: u64) -> Self {
        self.distribution_interval = interval;
        self
    }

    pub fn with_steps_per_tick(mut self, steps: usize) -> Self {
        self.steps_per_tick = steps;
        self
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_storage == 0 {
            return Err(ConfigError::Invalid {
                field: "max_storage",
                reason: "must be positive",
            });
        }
        if self.distribution_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "distribution_interval",
                reason: "must be positive",
            });
        }
        if self.steps_per_tick == 0 {
            return Err(ConfigError::Invalid {
                field: "steps_per_tick",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config field {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
