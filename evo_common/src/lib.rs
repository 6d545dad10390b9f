//! EVO Common Library
//!
//! Shared constants, configuration loading and servo domain types for all
//! EVO servo workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Bus limits, register and motion defaults
//! - [`config`] - Configuration loading traits and types
//! - [`servo`] - Axis/tick types, unit conversion, the `MotorBus` contract
//!   and the `ServoConfig` record
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! evo_common = { path = "../evo_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use evo_common::prelude::*;
//! use evo_common::servo::units::TickScale;
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod servo;
