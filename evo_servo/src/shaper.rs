//! Trajectory shaping and waypoint interpolation.

use evo_common::servo::types::{GoalMap, MeasuredState, Ticks};
use evo_common::servo::units::clamp_ticks;
use serde::{Deserialize, Serialize};

/// Easing applied to normalized progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shaping {
    /// `3a² − 2a³`: zero velocity at both ends.
    #[default]
    Smoothstep,
    /// `a`.
    Linear,
}

impl Shaping {
    /// Eased progress for `a ∈ [0, 1]`. Input outside the range is clamped.
    #[inline]
    pub fn shape(self, a: f64) -> f64 {
        let a = a.clamp(0.0, 1.0);
        match self {
            Self::Smoothstep => a * a * (3.0 - 2.0 * a),
            Self::Linear => a,
        }
    }
}

impl From<bool> for Shaping {
    /// `true` selects smoothstep.
    fn from(smoothstep: bool) -> Self {
        if smoothstep { Self::Smoothstep } else { Self::Linear }
    }
}

/// `round(start + (goal − start) × a)`, clamped to the tick range.
#[inline]
pub fn waypoint(start: Ticks, goal: Ticks, a: f64) -> Ticks {
    let start = f64::from(start);
    let span = f64::from(goal) - start;
    clamp_ticks((start + span * a).round() as i64)
}

/// Waypoints for every axis in `goals`, starting from the positions in `start`.
///
/// Axes missing from `start` are commanded straight to their goal; callers
/// validate the start read first.
pub fn waypoints(start: &MeasuredState, goals: &GoalMap, a: f64) -> GoalMap {
    goals
        .iter()
        .map(|(&axis, &goal)| {
            let from = start.position(axis).unwrap_or(goal);
            (axis, waypoint(from, goal, a))
        })
        .collect()
}
