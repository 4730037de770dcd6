//! # Configuration
//!
//! All tunables are loaded once at startup from TOML and fixed for the
//! lifetime of the objects built from them.
//!
//! ```toml
//! [light]
//! min_cycle_ms = 4000
//! max_cycle_ms = 6000
//! poll_interval_ms = 1
//!
//! [gate]
//! tick_interval_ms = 1
//!
//! [simulation]
//! intersections = 3
//! vehicles = 6
//! ```
//!
//! Every section is optional; missing keys fall back to the defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CrosswayError, CrosswayResult};

/// Default lower bound of a light cycle (ms).
pub const DEFAULT_MIN_CYCLE_MS: u64 = 4000;

/// Default upper bound of a light cycle (ms).
pub const DEFAULT_MAX_CYCLE_MS: u64 = 6000;

/// Default sleep between cycler checks and between gate ticks (ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Timing of a traffic light's phase cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTiming {
    /// Shortest phase duration (ms, inclusive).
    pub min_cycle_ms: u64,
    /// Longest phase duration (ms, inclusive).
    pub max_cycle_ms: u64,
    /// Sleep between elapsed-time checks (ms).
    pub poll_interval_ms: u64,
    /// Fixed RNG seed. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self {
            min_cycle_ms: DEFAULT_MIN_CYCLE_MS,
            max_cycle_ms: DEFAULT_MAX_CYCLE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            seed: None,
        }
    }
}

impl PhaseTiming {
    /// Timing with a custom cycle range and the default poll interval.
    #[must_use]
    pub const fn with_range(min_cycle_ms: u64, max_cycle_ms: u64) -> Self {
        Self {
            min_cycle_ms,
            max_cycle_ms,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            seed: None,
        }
    }

    /// Returns a copy with a fixed RNG seed.
    #[must_use]
    pub const fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sleep between elapsed-time checks.
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks the range and poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::InvalidConfig`] if the range is empty or
    /// inverted, or if the poll interval is zero.
    pub fn validate(&self) -> CrosswayResult<()> {
        if self.min_cycle_ms == 0 {
            return Err(CrosswayError::InvalidConfig(
                "light.min_cycle_ms must be greater than zero".to_string(),
            ));
        }
        if self.min_cycle_ms > self.max_cycle_ms {
            return Err(CrosswayError::InvalidConfig(format!(
                "light.min_cycle_ms ({}) exceeds light.max_cycle_ms ({})",
                self.min_cycle_ms, self.max_cycle_ms
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(CrosswayError::InvalidConfig(
                "light.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gate scheduling configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Interval between scheduling ticks (ms).
    pub tick_interval_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl GateConfig {
    /// Interval between scheduling ticks.
    #[inline]
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Parameters of the driver scaffold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of intersections on the loop road.
    pub intersections: usize,
    /// Number of vehicles.
    pub vehicles: usize,
    /// Time a vehicle occupies an intersection (ms).
    pub crossing_ms: u64,
    /// Time a vehicle spends between intersections (ms).
    pub travel_ms: u64,
    /// How long a vehicle waits in a queue before giving up the attempt (ms).
    pub patience_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            intersections: 3,
            vehicles: 6,
            crossing_ms: 500,
            travel_ms: 1000,
            patience_ms: 2000,
        }
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosswayConfig {
    /// Traffic light timing.
    pub light: PhaseTiming,
    /// Gate scheduling.
    pub gate: GateConfig,
    /// Driver parameters.
    pub simulation: SimulationConfig,
}

impl CrosswayConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::ConfigParse`] for malformed TOML and
    /// [`CrosswayError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> CrosswayResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CrosswayError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::ConfigIo`] if the file cannot be read, plus
    /// everything [`CrosswayConfig::from_toml_str`] can return.
    pub fn load(path: impl AsRef<Path>) -> CrosswayResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CrosswayError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::InvalidConfig`] naming the first bad key.
    pub fn validate(&self) -> CrosswayResult<()> {
        self.light.validate()?;
        if self.gate.tick_interval_ms == 0 {
            return Err(CrosswayError::InvalidConfig(
                "gate.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.simulation.intersections == 0 {
            return Err(CrosswayError::InvalidConfig(
                "simulation.intersections must be greater than zero".to_string(),
            ));
        }
        if self.simulation.patience_ms == 0 {
            return Err(CrosswayError::InvalidConfig(
                "simulation.patience_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
