//! DYNAMIXEL driver module.
//!
//! Protocol 2.0 actuators on a serial adapter (U2D2, OpenRB, ...).

mod driver;
pub mod protocol;
mod settings;

pub use driver::{DynamixelBus, PacketPort};
pub use settings::DynamixelSettings;

use evo_common::servo::bus::{BusError, MotorBus};
use evo_common::servo::config::ServoConfig;

/// Registry name of the DYNAMIXEL driver.
pub const DRIVER_NAME: &str = "dynamixel";

/// Factory function to create a DYNAMIXEL bus instance.
pub fn create_driver(config: &ServoConfig) -> Result<Box<dyn MotorBus>, BusError> {
    Ok(Box::new(DynamixelBus::new(config)?))
}
