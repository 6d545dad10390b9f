//! Motor bus driver implementations.
//!
//! - [`dynamixel`] - DYNAMIXEL Protocol 2.0 actuators over a serial adapter
//! - [`simulation`] - Software servo bus for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `MotorBus` trait from `evo_common::servo::bus`
//! 3. Register the driver in [`register_all_drivers`]

pub mod dynamixel;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers into `registry`.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register(dynamixel::DRIVER_NAME, dynamixel::create_driver);
    registry.register(simulation::DRIVER_NAME, simulation::create_driver);
}
