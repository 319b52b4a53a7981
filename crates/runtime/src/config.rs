//! Simulation configuration.

use std::path::Path;
use std::time::Duration;

use ability_core::CoreConfig;
use serde::{Deserialize, Serialize};

use crate::api::{Result, RuntimeError};

/// Fault model of the loopback network.
///
/// The container assumes reliable ordered channels; faults exist to exercise
/// the id-based staleness rules under adversarial delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// A newly queued message may jump ahead of up to this many queued ones.
    pub reorder_window: usize,
    /// Probability in `[0, 1]` that a message is silently lost.
    pub drop_probability: f64,
    pub seed: u64,
    /// Encode and decode every message with the wire codec.
    pub encode_messages: bool,
}

impl FaultConfig {
    pub const DEFAULT_SEED: u64 = 0x5EED;

    /// Reliable, ordered delivery.
    pub fn reliable() -> Self {
        Self {
            reorder_window: 0,
            drop_probability: 0.0,
            seed: Self::DEFAULT_SEED,
            encode_messages: true,
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.reorder_window == 0 && self.drop_probability <= 0.0
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

/// Runtime configuration for a [`Simulation`](crate::Simulation).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub core: CoreConfig,
    pub tick_interval: Duration,
    /// Number of client peers besides the authority. Client 1 owns the entity.
    pub clients: u32,
    pub faults: FaultConfig,
    /// Capacity of each event bus topic.
    pub event_buffer_size: usize,
    /// Upper bound on delivery rounds per pump, guarding against message storms.
    pub max_pump_rounds: usize,
}

impl SimulationConfig {
    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
    pub const DEFAULT_MAX_PUMP_ROUNDS: usize = 64;

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "tick_interval must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.faults.drop_probability) {
            return Err(RuntimeError::InvalidConfig(format!(
                "drop_probability {} is outside [0, 1]",
                self.faults.drop_probability
            )));
        }
        if self.event_buffer_size == 0 || self.max_pump_rounds == 0 {
            return Err(RuntimeError::InvalidConfig(
                "event_buffer_size and max_pump_rounds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a RON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::InvalidConfig(format!("Failed to read simulation config: {}", e))
        })?;

        let config: SimulationConfig = ron::from_str(&content).map_err(|e| {
            RuntimeError::InvalidConfig(format!("Failed to parse simulation config RON: {}", e))
        })?;
        config.validate()?;

        Ok(config)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            tick_interval: Self::DEFAULT_TICK_INTERVAL,
            clients: 1,
            faults: FaultConfig::default(),
            event_buffer_size: Self::DEFAULT_EVENT_BUFFER_SIZE,
            max_pump_rounds: Self::DEFAULT_MAX_PUMP_ROUNDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_falls_back_to_defaults() {
        let config: SimulationConfig =
            ron::from_str("(clients: 3, faults: (reorder_window: 2))").unwrap();
        assert_eq!(config.clients, 3);
        assert_eq!(config.faults.reorder_window, 2);
        assert_eq!(config.faults.seed, FaultConfig::DEFAULT_SEED);
        assert_eq!(config.tick_interval, SimulationConfig::DEFAULT_TICK_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_drop_probability() {
        let config = SimulationConfig {
            faults: FaultConfig {
                drop_probability: 1.5,
                ..FaultConfig::default()
            },
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(RuntimeError::InvalidConfig(_))));
    }
}
