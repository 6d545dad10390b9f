//! System-wide constants for the EVO servo workspace.
//!
//! Single source of truth for bus limits, register defaults and motion
//! defaults. Imported by all crates — no duplication permitted.

use static_assertions::const_assert;

/// Highest addressable axis ID on the bus (254 is broadcast, 253 reserved).
pub const MAX_AXIS_ID: u8 = 252;

/// Maximum number of configured axes (full ID space 0..=MAX_AXIS_ID).
pub const MAX_AXES: usize = MAX_AXIS_ID as usize + 1;

/// Default encoder resolution (XL330 / XM430 family).
pub const DEFAULT_TICKS_PER_REV: u32 = 4096;

/// Default serial baud rate.
pub const DEFAULT_BAUDRATE: u32 = 57_600;

/// Default packet protocol version.
pub const DEFAULT_PROTOCOL: f32 = 2.0;

/// Default bus driver.
pub const DEFAULT_DRIVER: &str = "simulation";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/evo/servo.toml";

/// Default service name when `[shared]` is omitted.
pub const DEFAULT_SERVICE_NAME: &str = "evo_servo";

// ─── Control table defaults (Protocol 2.0 X-series) ────────────────

/// Operating Mode register address.
pub const ADDR_OPERATING_MODE: u16 = 11;
/// Torque Enable register address.
pub const ADDR_TORQUE_ENABLE: u16 = 64;
/// Goal Position register address.
pub const ADDR_GOAL_POSITION: u16 = 116;
/// Present Current register address.
pub const ADDR_PRESENT_CURRENT: u16 = 126;
/// Present Position register address.
pub const ADDR_PRESENT_POSITION: u16 = 132;

/// Operating mode code for extended position (multi-turn) control.
pub const MODE_EXTENDED_POSITION: u8 = 4;

// ─── Motion defaults ────────────────────────────────────────────────

/// Default streamed motion duration in seconds.
pub const DEFAULT_DURATION_S: f64 = 1.0;
/// Default waypoint streaming rate.
pub const DEFAULT_POLL_HZ: u32 = 50;
/// Default settle tolerance in degrees.
pub const DEFAULT_EPSILON_DEG: f64 = 2.0;
/// Default number of consecutive in-tolerance polls.
pub const DEFAULT_SETTLE_STREAK: u32 = 3;
/// Default settle timeout as a multiple of the motion duration.
pub const DEFAULT_TIMEOUT_FACTOR: f64 = 2.0;
/// Default guard cadence divisor: guard read every `poll_hz / divisor` steps.
pub const DEFAULT_GUARD_DIVISOR: u32 = 10;

/// Lower bound of the settle timeout in seconds.
pub const MIN_SETTLE_TIMEOUT_S: f64 = 0.2;
/// Lower bound of the settle polling rate.
pub const MIN_SETTLE_POLL_HZ: u32 = 5;

const_assert!(MAX_AXES <= 256);
const_assert!(DEFAULT_TICKS_PER_REV > 0);
const_assert!(MIN_SETTLE_POLL_HZ > 0);
