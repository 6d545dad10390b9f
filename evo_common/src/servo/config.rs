//! Servo configuration types.
//!
//! This module contains the record loaded from `servo.toml`:
//! - `ServoConfig` - Top-level configuration
//! - `BusConfig` - Transport identity (driver, device, baud rate, protocol)
//! - `AxesConfig` - The fixed axis set and encoder resolution
//! - `RegisterMap` / `ModeConfig` - Opaque control-table constants
//! - `MotionDefaults` - Default parameters for one synchronized motion
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "turntable"
//!
//! [bus]
//! driver = "simulation"
//! device = "/dev/ttyUSB0"
//! baudrate = 57600
//!
//! [axes]
//! ids = [1, 2, 3]
//! ticks_per_rev = 4096
//!
//! [motion]
//! duration_s = 1.5
//! settle_streak = 10
//! current_guard = { min = -300, max = 300 }
//!
//! [driver_config.simulation]
//! time_constant_s = 0.05
//! ```

use crate::config::{ConfigError, ConfigLoader, SharedConfig};
use crate::consts::{
    ADDR_GOAL_POSITION, ADDR_OPERATING_MODE, ADDR_PRESENT_CURRENT, ADDR_PRESENT_POSITION,
    ADDR_TORQUE_ENABLE, DEFAULT_BAUDRATE, DEFAULT_DRIVER, DEFAULT_DURATION_S,
    DEFAULT_EPSILON_DEG, DEFAULT_GUARD_DIVISOR, DEFAULT_POLL_HZ, DEFAULT_PROTOCOL,
    DEFAULT_SETTLE_STREAK, DEFAULT_TICKS_PER_REV, DEFAULT_TIMEOUT_FACTOR, MAX_AXES, MAX_AXIS_ID,
    MODE_EXTENDED_POSITION,
};
use crate::servo::types::{AxisId, CurrentGuard, Ticks};
use crate::servo::units::TickScale;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baudrate() -> u32 {
    DEFAULT_BAUDRATE
}

fn default_protocol() -> f32 {
    DEFAULT_PROTOCOL
}

fn default_ticks_per_rev() -> u32 {
    DEFAULT_TICKS_PER_REV
}

/// Main configuration loaded from `servo.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoConfig {
    /// Service identity and log level.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Transport identity.
    #[serde(default)]
    pub bus: BusConfig,

    /// The fixed axis set.
    pub axes: AxesConfig,

    /// Control-table register addresses.
    #[serde(default)]
    pub registers: RegisterMap,

    /// Operating mode codes.
    #[serde(default)]
    pub modes: ModeConfig,

    /// Default motion parameters.
    #[serde(default)]
    pub motion: MotionDefaults,

    /// Per-driver configuration sections.
    /// Key = driver name, Value = driver-specific TOML table.
    #[serde(default)]
    pub driver_config: HashMap<String, toml::Value>,
}

/// Transport identity. Opaque to the execution layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Registered driver name (e.g., "simulation").
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Serial device path.
    #[serde(default = "default_device")]
    pub device: String,

    /// Serial baud rate.
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// Packet protocol version.
    #[serde(default = "default_protocol")]
    pub protocol: f32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            device: default_device(),
            baudrate: DEFAULT_BAUDRATE,
            protocol: DEFAULT_PROTOCOL,
        }
    }
}

/// The axis group addressed by every motion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxesConfig {
    /// Axis IDs, fixed for the session.
    pub ids: Vec<AxisId>,

    /// Encoder counts per revolution.
    #[serde(default = "default_ticks_per_rev")]
    pub ticks_per_rev: u32,

    /// Command value every axis starts with before the first target is set.
    #[serde(default)]
    pub initial_ticks: Ticks,
}

/// Control-table register addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMap {
    /// Operating Mode (1 byte).
    pub operating_mode: u16,
    /// Torque Enable (1 byte).
    pub torque_enable: u16,
    /// Goal Position (4 bytes).
    pub goal_position: u16,
    /// Present Position (4 bytes).
    pub present_position: u16,
    /// Present Current (2 bytes).
    pub present_current: u16,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            operating_mode: ADDR_OPERATING_MODE,
            torque_enable: ADDR_TORQUE_ENABLE,
            goal_position: ADDR_GOAL_POSITION,
            present_position: ADDR_PRESENT_POSITION,
            present_current: ADDR_PRESENT_CURRENT,
        }
    }
}

/// Operating mode codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Extended position (multi-turn) mode.
    pub extended_position: u8,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            extended_position: MODE_EXTENDED_POSITION,
        }
    }
}

/// Default parameters for one synchronized motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDefaults {
    /// Streaming duration in seconds.
    pub duration_s: f64,
    /// Waypoint rate.
    pub poll_hz: u32,
    /// Settle tolerance in degrees.
    pub epsilon_deg: f64,
    /// Consecutive in-tolerance polls required to settle.
    pub settle_streak: u32,
    /// Settle timeout as a multiple of `duration_s`.
    pub timeout_factor: f64,
    /// Smoothstep easing (false = linear).
    pub smoothstep: bool,
    /// Guard read every `max(1, poll_hz / guard_divisor)` steps.
    pub guard_divisor: u32,
    /// Optional safe current band.
    pub current_guard: Option<CurrentGuard>,
}

impl Default for MotionDefaults {
    fn default() -> Self {
        Self {
            duration_s: DEFAULT_DURATION_S,
            poll_hz: DEFAULT_POLL_HZ,
            epsilon_deg: DEFAULT_EPSILON_DEG,
            settle_streak: DEFAULT_SETTLE_STREAK,
            timeout_factor: DEFAULT_TIMEOUT_FACTOR,
            smoothstep: true,
            guard_divisor: DEFAULT_GUARD_DIVISOR,
            current_guard: None,
        }
    }
}

impl MotionDefaults {
    /// Validate motion parameters.
    ///
    /// # Validation Rules
    /// 1. `duration_s`, `epsilon_deg`, `timeout_factor` finite and >= 0
    /// 2. `duration_s` and `duration_s * timeout_factor` fit a `Duration`
    /// 3. `poll_hz`, `settle_streak`, `guard_divisor` > 0
    /// 4. `current_guard.min` <= `current_guard.max`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("duration_s", self.duration_s),
            ("epsilon_deg", self.epsilon_deg),
            ("timeout_factor", self.timeout_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "motion.{name} must be finite and >= 0 (got {value})"
                )));
            }
        }

        for (name, value) in [
            ("duration_s", self.duration_s),
            ("duration_s * timeout_factor", self.duration_s * self.timeout_factor),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "motion.{name} of {value} s is out of range"
                )));
            }
        }

        for (name, value) in [
            ("poll_hz", self.poll_hz),
            ("settle_streak", self.settle_streak),
            ("guard_divisor", self.guard_divisor),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "motion.{name} must be greater than 0"
                )));
            }
        }

        if let Some(guard) = self.current_guard {
            if guard.min > guard.max {
                return Err(ConfigError::ValidationError(format!(
                    "motion.current_guard.min ({}) must be <= max ({})",
                    guard.min, guard.max
                )));
            }
        }

        Ok(())
    }
}

impl ServoConfig {
    /// Minimal configuration for `ids` with every other section defaulted.
    pub fn for_axes(ids: &[AxisId]) -> Self {
        Self {
            shared: SharedConfig::default(),
            bus: BusConfig::default(),
            axes: AxesConfig {
                ids: ids.to_vec(),
                ticks_per_rev: DEFAULT_TICKS_PER_REV,
                initial_ticks: 0,
            },
            registers: RegisterMap::default(),
            modes: ModeConfig::default(),
            motion: MotionDefaults::default(),
            driver_config: HashMap::new(),
        }
    }

    /// Load `servo.toml` and validate it.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Conversion scale for the configured encoder resolution.
    pub fn tick_scale(&self) -> TickScale {
        TickScale::new(self.axes.ticks_per_rev)
    }

    /// Driver-specific TOML table, if present.
    pub fn driver_section(&self, driver: &str) -> Option<&toml::Value> {
        self.driver_config.get(driver)
    }

    /// Validate the servo configuration.
    ///
    /// # Validation Rules
    /// 1. `shared` valid
    /// 2. `axes.ids` non-empty, unique, each <= MAX_AXIS_ID, count <= MAX_AXES
    /// 3. `axes.ticks_per_rev` > 0
    /// 4. `bus.driver` non-empty, `bus.baudrate` > 0
    /// 5. `motion` valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.axes.ids.is_empty() {
            return Err(ConfigError::ValidationError(
                "axes.ids cannot be empty".to_string(),
            ));
        }

        if self.axes.ids.len() > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "Too many axes: {} (max {})",
                self.axes.ids.len(),
                MAX_AXES
            )));
        }

        let mut seen = HashSet::new();
        for &id in &self.axes.ids {
            if id > MAX_AXIS_ID {
                return Err(ConfigError::ValidationError(format!(
                    "Axis ID {id} out of range (max {MAX_AXIS_ID})"
                )));
            }
            if !seen.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate axis ID: {id}"
                )));
            }
        }

        if self.axes.ticks_per_rev == 0 {
            return Err(ConfigError::ValidationError(
                "axes.ticks_per_rev must be greater than 0".to_string(),
            ));
        }

        if self.bus.driver.is_empty() {
            return Err(ConfigError::ValidationError(
                "bus.driver cannot be empty".to_string(),
            ));
        }

        if self.bus.baudrate == 0 {
            return Err(ConfigError::ValidationError(
                "bus.baudrate must be greater than 0".to_string(),
            ));
        }

        self.motion.validate()
    }
}
