//! Motor bus trait and error types.
//!
//! This module defines:
//! - `MotorBus` trait - Interface for pluggable bus transports
//! - `BusError` enum - Error types for bus operations
//! - `CurrentSupport` - Sticky runtime probe of the present-current channel

use crate::servo::types::{AxisId, GoalMap, MeasuredState};
use thiserror::Error;
use tracing::{debug, info};

/// Error types for bus operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BusError {
    /// Port could not be opened or configured.
    #[error("Failed to open bus: {0}")]
    OpenFailed(String),

    /// Operation attempted while the port is closed.
    #[error("Bus is not open")]
    NotOpen,

    /// Read or write failed at the protocol layer.
    #[error("Bus transport failure: {0}")]
    Transport(String),

    /// A required telemetry field was missing from a bulk read.
    #[error("Telemetry unavailable: {field} for axis {axis}")]
    TelemetryUnavailable {
        /// Axis whose field is missing.
        axis: AxisId,
        /// Register name of the missing field.
        field: &'static str,
    },

    /// Axis is not part of the configured group.
    #[error("Unknown axis: {0}")]
    UnknownAxis(AxisId),

    /// Driver not found in the registry.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Driver-specific configuration is invalid.
    #[error("Driver configuration error: {0}")]
    ConfigError(String),
}

/// Runtime capability of the present-current channel.
///
/// Starts `Unknown`; the first current-bearing read resolves it. Once
/// `Unsupported`, it stays so for the rest of the session and the channel is
/// never requested again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentSupport {
    /// No current-bearing read attempted yet.
    #[default]
    Unknown,
    /// Every axis returned a current on the probing read.
    Supported,
    /// At least one axis returned no current; channel disabled.
    Unsupported,
}

impl CurrentSupport {
    /// Whether a read that wants current should actually request it.
    #[inline]
    pub const fn should_request(self, want_current: bool) -> bool {
        want_current && !matches!(self, Self::Unsupported)
    }

    /// Fold the outcome of a current-bearing read into the probe.
    ///
    /// `all_present` is true when every requested axis delivered a current.
    pub fn observe(&mut self, all_present: bool) {
        match (*self, all_present) {
            (Self::Unknown, true) => {
                debug!("Present current channel supported");
                *self = Self::Supported;
            }
            (Self::Unknown | Self::Supported, false) => {
                info!("Present current channel unavailable, disabling current reads for this session");
                *self = Self::Unsupported;
            }
            _ => {}
        }
    }
}

/// Trait defining the interface for motor bus transports.
///
/// The execution layer manages transports through this trait, enabling
/// pluggable backends (simulation, serial Protocol 2.0 adapters, ...).
///
/// # Lifecycle
///
/// 1. `open()` - Acquire and configure the port
/// 2. register writes / `bulk_read()` / `sync_write()` - Blocking I/O
/// 3. `close()` - Release the port
///
/// # Contracts
///
/// | Operation | Partial result | On failure |
/// |-----------|----------------|------------|
/// | `bulk_read()` | position for every axis or error; current best effort | whole call fails |
/// | `sync_write()` | never | no goal queued |
/// | `set_mode()` / `set_torque()` | n/a | single register write failed |
pub trait MotorBus: Send {
    /// Returns the transport's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Open and configure the port (device, baud rate).
    ///
    /// # Errors
    /// Return `BusError::OpenFailed` if the port cannot be opened or configured.
    fn open(&mut self) -> Result<(), BusError>;

    /// Close the port. Closing a closed bus is a no-op.
    fn close(&mut self) -> Result<(), BusError>;

    /// Whether the port is currently open.
    fn is_open(&self) -> bool;

    /// Best-effort scan of the ID space; returns responding axes in order.
    fn discover(&mut self) -> Result<Vec<AxisId>, BusError>;

    /// Write the operating-mode register of one axis.
    fn set_mode(&mut self, axis: AxisId, mode: u8) -> Result<(), BusError>;

    /// Write the torque-enable register of one axis.
    fn set_torque(&mut self, axis: AxisId, enabled: bool) -> Result<(), BusError>;

    /// Read present position (required) and, if wanted and supported,
    /// present current for every axis in `axes`.
    ///
    /// Implementations consult and update their [`CurrentSupport`] so an
    /// unsupported channel is asked for at most once.
    ///
    /// # Errors
    /// `BusError::Transport` on protocol failure,
    /// `BusError::TelemetryUnavailable` if any position is missing.
    fn bulk_read(&mut self, axes: &[AxisId], want_current: bool)
    -> Result<MeasuredState, BusError>;

    /// Queue every goal for simultaneous transmission, or fail as a whole.
    fn sync_write(&mut self, goals: &GoalMap) -> Result<(), BusError>;

    /// Current state of the present-current probe.
    fn current_support(&self) -> CurrentSupport {
        CurrentSupport::Unknown
    }
}
