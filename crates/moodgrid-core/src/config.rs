//! Simulation configuration: board size, timer cadences and idle decay.
//!
//! Every field has a default, so a JSON document only needs the values it
//! changes:
//!
//! ```
//! use moodgrid_core::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "grid_width": 10, "seed": 7 }"#).unwrap();
//! assert_eq!(config.grid_width, 10);
//! assert_eq!(config.grid_height, 8);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Source emits one particle per open side at this cadence.
    pub emission_interval_ms: f64,
    /// How often the goal is polled for progress and victory.
    pub goal_check_interval_ms: f64,
    /// Failure deadline armed at start, before any progress.
    pub initial_timeout_ms: f64,
    /// Failure deadline re-armed each time the goal is seen gaining energy.
    pub progress_timeout_ms: f64,
    /// Delay before joy reaches a neighbouring piece.
    pub joy_spread_delay_ms: f64,
    /// Mood stability lost per reference tick while idle.
    pub mood_stability_decay: f32,
    /// Piece energy multiplier per reference tick while idle.
    pub idle_energy_decay: f32,
    /// Idle energy below this snaps to zero.
    pub idle_energy_floor: f32,
    /// Seed for burnout and power-through rolls. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_width: 8,
            grid_height: 8,
            emission_interval_ms: 1000.0,
            goal_check_interval_ms: 100.0,
            initial_timeout_ms: 5000.0,
            progress_timeout_ms: 2000.0,
            joy_spread_delay_ms: 300.0,
            mood_stability_decay: 0.005,
            idle_energy_decay: 0.98,
            idle_energy_floor: 0.1,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }

        let intervals = [
            ("emission_interval_ms", self.emission_interval_ms),
            ("goal_check_interval_ms", self.goal_check_interval_ms),
            ("initial_timeout_ms", self.initial_timeout_ms),
            ("progress_timeout_ms", self.progress_timeout_ms),
            ("joy_spread_delay_ms", self.joy_spread_delay_ms),
        ];
        for (name, value) in intervals {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)));
            }
        }

        if self.idle_energy_decay.is_nan() || self.idle_energy_decay <= 0.0 || self.idle_energy_decay > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "idle_energy_decay must be in (0, 1], got {}",
                self.idle_energy_decay
            )));
        }
        if self.mood_stability_decay < 0.0 {
            return Err(ConfigError::Invalid("mood_stability_decay must not be negative".into()));
        }
        Ok(())
    }
}
