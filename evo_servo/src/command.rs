//! Command state store.
//!
//! Holds the authoritative intended target of every configured axis. The
//! store is mutated only by explicit absolute sets, relative nudges, or a
//! deliberate reset to a measured position. Relative nudges accumulate on the
//! stored command, never on a measured position, so sensor jitter cannot walk
//! the command away from operator intent.

use crate::error::ServoError;
use evo_common::servo::types::{AxisId, GoalMap, MeasuredState, Ticks};
use evo_common::servo::units::{TickScale, clamp_ticks};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Per-axis angles in degrees.
pub type DegreeMap = BTreeMap<AxisId, f64>;

/// How [`CommandState::reset_to_measured`] snaps the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Command := present position.
    ToPresent,
    /// Command := present position rounded to the nearest whole revolution.
    ToNearestTurn,
}

impl ResetMode {
    /// Configuration string for this mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToPresent => "to_present",
            Self::ToNearestTurn => "to_nearest_turn",
        }
    }
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetMode {
    type Err = ServoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_present" => Ok(Self::ToPresent),
            "to_nearest_turn" => Ok(Self::ToNearestTurn),
            other => Err(ServoError::InvalidConfiguration(format!(
                "reset mode must be 'to_present' or 'to_nearest_turn' (got '{other}')"
            ))),
        }
    }
}

/// Intended target of every configured axis, always fully populated.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandState {
    scale: TickScale,
    ticks: GoalMap,
}

impl CommandState {
    /// Create a store with every axis in `ids` commanded to `initial`.
    pub fn new(ids: &[AxisId], initial: Ticks, scale: TickScale) -> Self {
        Self {
            scale,
            ticks: ids.iter().map(|&id| (id, initial)).collect(),
        }
    }

    /// Overwrite the command of each axis in `targets` (degrees).
    ///
    /// Axes absent from `targets` keep their command. Fails without touching
    /// the store if any axis is not configured.
    pub fn set_absolute(&mut self, targets: &DegreeMap) -> Result<(), ServoError> {
        self.check_axes(targets)?;
        for (&axis, &deg) in targets {
            self.ticks.insert(axis, self.scale.deg_to_ticks_clamped(deg));
        }
        Ok(())
    }

    /// Add each delta (degrees) to the stored command of its axis.
    pub fn set_relative(&mut self, deltas: &DegreeMap) -> Result<(), ServoError> {
        self.check_axes(deltas)?;
        for (&axis, &deg) in deltas {
            let delta = self.scale.deg_to_ticks(deg);
            if let Some(ticks) = self.ticks.get_mut(&axis) {
                *ticks = clamp_ticks(i64::from(*ticks).saturating_add(delta));
            }
        }
        Ok(())
    }

    /// Snap every command to the measured position per `mode`.
    ///
    /// `measured` must carry a position for every configured axis.
    pub fn reset_to_measured(
        &mut self,
        measured: &MeasuredState,
        mode: ResetMode,
    ) -> Result<(), ServoError> {
        let ids: Vec<AxisId> = self.ticks.keys().copied().collect();
        measured.require_positions(&ids)?;
        for (axis, ticks) in self.ticks.iter_mut() {
            if let Some(position) = measured.position(*axis) {
                *ticks = match mode {
                    ResetMode::ToPresent => position,
                    ResetMode::ToNearestTurn => self.scale.nearest_turn(position),
                };
            }
        }
        Ok(())
    }

    /// Stored command of `axis`.
    pub fn get(&self, axis: AxisId) -> Option<Ticks> {
        self.ticks.get(&axis).copied()
    }

    /// Stored command of `axis` in degrees.
    pub fn get_deg(&self, axis: AxisId) -> Option<f64> {
        self.get(axis).map(|t| self.scale.ticks_to_deg(i64::from(t)))
    }

    /// All commands in axis order.
    pub fn goals(&self) -> &GoalMap {
        &self.ticks
    }

    /// Configured axes in order.
    pub fn ids(&self) -> Vec<AxisId> {
        self.ticks.keys().copied().collect()
    }

    /// Conversion scale used by this store.
    pub fn scale(&self) -> TickScale {
        self.scale
    }

    fn check_axes(&self, values: &DegreeMap) -> Result<(), ServoError> {
        match values.keys().find(|axis| !self.ticks.contains_key(axis)) {
            Some(axis) => Err(ServoError::InvalidConfiguration(format!(
                "axis {axis} is not configured"
            ))),
            None => Ok(()),
        }
    }
}
