//! # EVO HAL Library
//!
//! Motor bus drivers with a pluggable driver registry.
//!
//! Drivers implement the `MotorBus` trait defined in
//! `evo_common::servo::bus` and are created by name through
//! [`DriverRegistry`].
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Bus driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     evo_hal (single crate)                   │
//! │  ┌──────────────┐    ┌──────────────────┐                    │
//! │  │ ServoConfig  │───►│ Driver Registry  │                    │
//! │  │ (evo_common) │    │  name → factory  │                    │
//! │  └──────────────┘    └────────┬─────────┘                    │
//! │                               │                              │
//! │                               ▼                              │
//! │                      ┌────────────────┐                      │
//! │                      │  MotorBus      │ (trait object)       │
//! │                      │  trait         │                      │
//! │                      └────────────────┘                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod driver_registry;
pub mod drivers;

pub use crate::driver_registry::{BusFactory, DriverRegistry};
