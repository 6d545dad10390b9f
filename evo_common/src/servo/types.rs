//! Servo telemetry and command types.
//!
//! - `AxisId` / `Ticks` / `Current` - Bus-native scalar units
//! - `AxisSample` - One axis worth of telemetry from a bulk read
//! - `MeasuredState` - Telemetry for a whole axis group
//! - `GoalMap` - Per-axis goal positions for a synchronized write
//! - `CurrentGuard` - Safe current band checked during streaming

use crate::servo::bus::BusError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bus address of a single actuator.
pub type AxisId = u8;

/// Native signed 32-bit position unit of the bus.
pub type Ticks = i32;

/// Raw signed 16-bit present-current reading.
pub type Current = i16;

/// Goal positions keyed by axis, in transmission order.
pub type GoalMap = BTreeMap<AxisId, Ticks>;

/// Telemetry for one axis from a single bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSample {
    /// Present position (required).
    pub position: Ticks,
    /// Present current, absent when the channel is unsupported or skipped.
    pub current: Option<Current>,
}

impl AxisSample {
    /// Sample carrying a position only.
    pub const fn position_only(position: Ticks) -> Self {
        Self {
            position,
            current: None,
        }
    }

    /// Sample carrying both position and current.
    pub const fn with_current(position: Ticks, current: Current) -> Self {
        Self {
            position,
            current: Some(current),
        }
    }
}

/// Telemetry for an axis group, refreshed on every bus poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasuredState {
    samples: BTreeMap<AxisId, AxisSample>,
}

impl MeasuredState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the sample for `axis`, replacing any previous one.
    pub fn insert(&mut self, axis: AxisId, sample: AxisSample) {
        self.samples.insert(axis, sample);
    }

    /// Sample for `axis`, if it was read.
    pub fn get(&self, axis: AxisId) -> Option<&AxisSample> {
        self.samples.get(&axis)
    }

    /// Present position of `axis`.
    pub fn position(&self, axis: AxisId) -> Option<Ticks> {
        self.samples.get(&axis).map(|s| s.position)
    }

    /// Present current of `axis` (None if not read or unsupported).
    pub fn current(&self, axis: AxisId) -> Option<Current> {
        self.samples.get(&axis).and_then(|s| s.current)
    }

    /// Positions of every axis in the state.
    pub fn positions(&self) -> GoalMap {
        self.samples
            .iter()
            .map(|(&axis, s)| (axis, s.position))
            .collect()
    }

    /// Iterate samples in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (AxisId, &AxisSample)> {
        self.samples.iter().map(|(&axis, s)| (axis, s))
    }

    /// Number of axes in the state.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no axis was read.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if every sample carries a current reading.
    pub fn has_all_currents(&self) -> bool {
        !self.samples.is_empty() && self.samples.values().all(|s| s.current.is_some())
    }

    /// Check that a position is present for every axis in `axes`.
    ///
    /// # Errors
    /// Returns `BusError::TelemetryUnavailable` naming the first axis whose
    /// position is missing.
    pub fn require_positions(&self, axes: &[AxisId]) -> Result<(), BusError> {
        match axes.iter().find(|axis| !self.samples.contains_key(axis)) {
            Some(&axis) => Err(BusError::TelemetryUnavailable {
                axis,
                field: "present_position",
            }),
            None => Ok(()),
        }
    }

    /// Largest `|goal - position|` over the axes in `goals`.
    ///
    /// Axes missing from the state are skipped; callers validate completeness
    /// with [`MeasuredState::require_positions`] first.
    pub fn max_abs_error(&self, goals: &GoalMap) -> i64 {
        goals
            .iter()
            .filter_map(|(axis, &goal)| {
                self.position(*axis)
                    .map(|pos| (i64::from(goal) - i64::from(pos)).abs())
            })
            .max()
            .unwrap_or(0)
    }
}

/// Safe band for present-current readings, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentGuard {
    /// Lowest allowed reading.
    pub min: Current,
    /// Highest allowed reading.
    pub max: Current,
}

impl CurrentGuard {
    /// Create a guard band.
    pub const fn new(min: Current, max: Current) -> Self {
        Self { min, max }
    }

    /// True if `current` lies inside `[min, max]`.
    #[inline]
    pub const fn contains(&self, current: Current) -> bool {
        current >= self.min && current <= self.max
    }

    /// Axes whose current lies outside the band. Absent currents never trip.
    pub fn violations(&self, state: &MeasuredState) -> Vec<(AxisId, Current)> {
        state
            .iter()
            .filter_map(|(axis, s)| s.current.map(|c| (axis, c)))
            .filter(|&(_, c)| !self.contains(c))
            .collect()
    }
}
