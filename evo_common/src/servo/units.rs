//! Degree <-> tick conversion.
//!
//! Rounding is round-half-away-from-zero (`f64::round`) everywhere in the
//! workspace. Each conversion performs exactly one rounding step.

use crate::servo::types::Ticks;

/// Clamp a wide tick value into the bus's signed 32-bit range.
#[inline]
pub fn clamp_ticks(raw: i64) -> Ticks {
    raw.clamp(i64::from(Ticks::MIN), i64::from(Ticks::MAX)) as Ticks
}

/// Conversion scale for one encoder resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickScale {
    ticks_per_rev: u32,
}

impl TickScale {
    /// Create a scale for `ticks_per_rev` encoder counts per revolution.
    ///
    /// `ticks_per_rev` must be non-zero; `ServoConfig::validate` enforces it.
    pub const fn new(ticks_per_rev: u32) -> Self {
        Self { ticks_per_rev }
    }

    /// Encoder counts per revolution.
    #[inline]
    pub const fn ticks_per_rev(&self) -> u32 {
        self.ticks_per_rev
    }

    /// `round(deg * ticks_per_rev / 360)`, unclamped.
    ///
    /// Non-finite input saturates (`NaN` maps to 0).
    #[inline]
    pub fn deg_to_ticks(&self, deg: f64) -> i64 {
        (deg * f64::from(self.ticks_per_rev) / 360.0).round() as i64
    }

    /// [`TickScale::deg_to_ticks`] clamped into the bus range.
    #[inline]
    pub fn deg_to_ticks_clamped(&self, deg: f64) -> Ticks {
        clamp_ticks(self.deg_to_ticks(deg))
    }

    /// `ticks * 360 / ticks_per_rev`, exact and unclamped.
    #[inline]
    pub fn ticks_to_deg(&self, ticks: i64) -> f64 {
        ticks as f64 * 360.0 / f64::from(self.ticks_per_rev)
    }

    /// Nearest whole revolution of `ticks`.
    pub fn nearest_turn(&self, ticks: Ticks) -> Ticks {
        let rev = f64::from(self.ticks_per_rev);
        clamp_ticks(((f64::from(ticks) / rev).round() * rev) as i64)
    }
}
