//! Servo domain: axis types, unit conversion, the bus contract and config.
//!
//! Drivers in `evo_hal` implement [`bus::MotorBus`]; the execution layer in
//! `evo_servo` only ever talks to the trait.

pub mod bus;
pub mod config;
pub mod types;
pub mod units;
