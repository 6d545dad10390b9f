//! Simulation driver module.
//!
//! Software servo bus for development and testing without physical hardware.

mod axis;
mod driver;
mod settings;

pub use axis::ServoSimulator;
pub use driver::{BusStats, SimTime, SimulatedBus};
pub use settings::SimulationSettings;

use evo_common::servo::bus::{BusError, MotorBus};
use evo_common::servo::config::ServoConfig;

/// Registry name of the simulation driver.
pub const DRIVER_NAME: &str = "simulation";

/// Factory function to create a simulation bus instance.
pub fn create_driver(config: &ServoConfig) -> Result<Box<dyn MotorBus>, BusError> {
    Ok(Box::new(SimulatedBus::new(config)?))
}
