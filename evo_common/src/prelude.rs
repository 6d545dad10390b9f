//! Prelude module for common re-exports.
//!
//! `use evo_common::prelude::*;` brings in the types nearly every servo
//! crate touches without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use evo_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::servo::config::{MotionDefaults, ServoConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_AXES, MAX_AXIS_ID};

// ─── Servo domain ───────────────────────────────────────────────────
pub use crate::servo::bus::{BusError, CurrentSupport, MotorBus};
pub use crate::servo::types::{
    AxisId, AxisSample, Current, CurrentGuard, GoalMap, MeasuredState, Ticks,
};
pub use crate::servo::units::{TickScale, clamp_ticks};
