//! Operating-mode manager.
//!
//! Switching an actuator into extended-position (multi-turn) mode is a
//! three-step sequence per axis: torque off, mode write, torque on. The mode
//! register is only writable with torque disabled, so the steps of one axis
//! are never reordered or interleaved. Axes are processed one after another.

use crate::error::ServoError;
use evo_common::servo::bus::MotorBus;
use evo_common::servo::types::AxisId;
use tracing::{debug, info, warn};

/// Step of the per-axis mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSwitchStep {
    /// Torque-enable := 0.
    DisableTorque,
    /// Operating mode := extended position.
    SetMode,
    /// Torque-enable := 1.
    EnableTorque,
}

impl ModeSwitchStep {
    /// The strict per-axis order.
    pub const SEQUENCE: [Self; 3] = [Self::DisableTorque, Self::SetMode, Self::EnableTorque];

    fn apply(self, bus: &mut dyn MotorBus, axis: AxisId, mode: u8) -> Result<(), ServoError> {
        match self {
            Self::DisableTorque => bus.set_torque(axis, false)?,
            Self::SetMode => bus.set_mode(axis, mode)?,
            Self::EnableTorque => bus.set_torque(axis, true)?,
        }
        Ok(())
    }
}

/// Put every axis in `axes` into operating mode `mode`.
///
/// Stops at the first failing write and returns its error; axes already
/// switched stay switched.
pub fn ensure_extended_mode(
    bus: &mut dyn MotorBus,
    axes: &[AxisId],
    mode: u8,
) -> Result<(), ServoError> {
    info!("Switching {} axes to operating mode {}", axes.len(), mode);
    for &axis in axes {
        for step in ModeSwitchStep::SEQUENCE {
            step.apply(bus, axis, mode).inspect_err(|e| {
                warn!(axis, ?step, "Mode switch failed: {}", e);
            })?;
        }
        debug!(axis, mode, "Axis mode switched");
    }
    Ok(())
}
