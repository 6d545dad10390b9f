//! Error types for the servo execution layer.

use evo_common::config::ConfigError;
use evo_common::servo::bus::BusError;
use thiserror::Error;

/// Failures surfaced to callers of the execution layer.
///
/// Guard trips and settle timeouts are not errors; they are reported through
/// [`crate::executor::MotionOutcome`].
#[derive(Debug, Error)]
pub enum ServoError {
    /// Transport or telemetry failure reported by the bus. Never retried here.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Configuration file could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Caller misuse: unknown axis, malformed reset mode, bad motion profile.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Bus operation attempted before `connect()`.
    #[error("Servo session is not connected")]
    NotConnected,
}

impl ServoError {
    /// True for bus-level transport or telemetry failures.
    pub fn is_bus(&self) -> bool {
        matches!(self, Self::Bus(_))
    }
}
