//! # EVO Servo
//!
//! Time-synchronized execution layer for a group of rotary servos sharing
//! one serial bus. Given per-axis target angles, all axes are driven so that
//! they arrive at the same wall-clock time, then polled until the group
//! settles within tolerance.
//!
//! # Module Structure
//!
//! - [`command`] - Authoritative per-axis command store
//! - [`shaper`] - Easing curves and waypoint interpolation
//! - [`mode`] - Torque-off / mode-set / torque-on sequencing
//! - [`executor`] - Streaming + settle state machine
//! - [`session`] - Caller-facing facade owning bus, store and clock
//! - [`clock`] - Monotonic and virtual time sources
//! - [`targets`] - `ID=DEG` / `all=DEG` target specs
//!
//! # Example
//!
//! ```rust,no_run
//! use evo_common::servo::config::ServoConfig;
//! use evo_hal::DriverRegistry;
//! use evo_servo::session::ServoSession;
//!
//! # fn main() -> Result<(), evo_servo::error::ServoError> {
//! let config = ServoConfig::for_axes(&[1, 2]);
//! let registry = DriverRegistry::with_builtin_drivers();
//! let mut session = ServoSession::from_registry(config, &registry)?;
//! session.connect()?;
//! session.ensure_extended_mode()?;
//! session.set_absolute(&[(1, 90.0), (2, -45.0)].into_iter().collect())?;
//! let result = session.execute_default()?;
//! println!("settled={} max_err={:.2} deg", result.settled, result.max_err_deg);
//! session.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod command;
pub mod error;
pub mod executor;
pub mod mode;
pub mod session;
pub mod shaper;
pub mod targets;

pub use crate::command::{CommandState, DegreeMap, ResetMode};
pub use crate::error::ServoError;
pub use crate::executor::{MotionOutcome, MotionProfile, MotionResult, SyncExecutor};
pub use crate::session::ServoSession;
