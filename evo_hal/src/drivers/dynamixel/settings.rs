//! `[driver_config.dynamixel]` section.

use evo_common::servo::bus::BusError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serial timing of the DYNAMIXEL driver.
///
/// # TOML Example
///
/// ```toml
/// [driver_config.dynamixel]
/// timeout_ms = 50
/// scan_timeout_ms = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamixelSettings {
    /// Read timeout for status packets during motions.
    pub timeout_ms: u64,
    /// Read timeout per ping while scanning the ID space.
    pub scan_timeout_ms: u64,
}

impl Default for DynamixelSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 50,
            scan_timeout_ms: 10,
        }
    }
}

impl DynamixelSettings {
    /// Parse the driver section, or defaults when it is absent.
    pub fn from_section(section: Option<&toml::Value>) -> Result<Self, BusError> {
        let settings: Self = match section {
            Some(value) => value
                .clone()
                .try_into()
                .map_err(|e| BusError::ConfigError(format!("driver_config.dynamixel: {e}")))?,
            None => Self::default(),
        };
        if settings.timeout_ms == 0 || settings.scan_timeout_ms == 0 {
            return Err(BusError::ConfigError(
                "driver_config.dynamixel timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(settings)
    }

    /// Status read timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Ping timeout while scanning.
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}
