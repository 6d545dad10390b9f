//! `[driver_config.simulation]` section.

use evo_common::consts::DEFAULT_TICKS_PER_REV;
use evo_common::servo::bus::BusError;
use evo_common::servo::types::{AxisId, Ticks};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunables of the simulated servos.
///
/// # TOML Example
///
/// ```toml
/// [driver_config.simulation]
/// max_velocity_tps = 8192.0
/// time_constant_s = 0.05
/// supports_current = false
/// offline_ids = [3]
/// initial_positions = { "1" = 1024 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Velocity limit in ticks per second.
    pub max_velocity_tps: f64,
    /// First-order response time constant in seconds (0 = instant).
    pub time_constant_s: f64,
    /// Present-current units per tick of following error.
    pub current_per_tick: f64,
    /// Whether the simulated firmware exposes Present Current.
    pub supports_current: bool,
    /// Configured axes that never answer.
    pub offline_ids: Vec<AxisId>,
    /// Power-on positions keyed by axis ID (TOML keys are strings).
    pub initial_positions: BTreeMap<String, Ticks>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_velocity_tps: 2.0 * f64::from(DEFAULT_TICKS_PER_REV),
            time_constant_s: 0.05,
            current_per_tick: 0.5,
            supports_current: true,
            offline_ids: Vec::new(),
            initial_positions: BTreeMap::new(),
        }
    }
}

impl SimulationSettings {
    /// Parse the driver section, or defaults when it is absent.
    pub fn from_section(section: Option<&toml::Value>) -> Result<Self, BusError> {
        let settings: Self = match section {
            Some(value) => value
                .clone()
                .try_into()
                .map_err(|e| BusError::ConfigError(format!("driver_config.simulation: {e}")))?,
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Power-on positions with keys parsed to axis IDs.
    pub fn initial_positions(&self) -> Result<BTreeMap<AxisId, Ticks>, BusError> {
        self.initial_positions
            .iter()
            .map(|(key, &ticks)| {
                key.parse::<AxisId>().map(|id| (id, ticks)).map_err(|_| {
                    BusError::ConfigError(format!(
                        "driver_config.simulation.initial_positions: invalid axis ID '{key}'"
                    ))
                })
            })
            .collect()
    }

    fn validate(&self) -> Result<(), BusError> {
        if !(self.max_velocity_tps.is_finite() && self.max_velocity_tps > 0.0) {
            return Err(BusError::ConfigError(
                "driver_config.simulation.max_velocity_tps must be > 0".to_string(),
            ));
        }
        if !(self.time_constant_s.is_finite() && self.time_constant_s >= 0.0) {
            return Err(BusError::ConfigError(
                "driver_config.simulation.time_constant_s must be >= 0".to_string(),
            ));
        }
        if !self.current_per_tick.is_finite() {
            return Err(BusError::ConfigError(
                "driver_config.simulation.current_per_tick must be finite".to_string(),
            ));
        }
        self.initial_positions().map(|_| ())
    }
}
