//! Driver registry for motor bus drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving bus
//! driver factories. Constructor-injected, no global state.

use evo_common::servo::bus::{BusError, MotorBus};
use evo_common::servo::config::ServoConfig;
use std::collections::HashMap;

use crate::drivers::register_all_drivers;

/// Factory function type for creating bus instances from configuration.
pub type BusFactory = fn(&ServoConfig) -> Result<Box<dyn MotorBus>, BusError>;

/// Registry of available bus drivers.
///
/// Constructed at startup, populated via `register()`, and queried by the
/// session when the bus is connected. Testable in isolation.
pub struct DriverRegistry {
    factories: HashMap<&'static str, BusFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: BusFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BusFactory> {
        self.factories.get(name).copied()
    }

    /// Create a bus instance by name.
    ///
    /// # Errors
    /// Returns `BusError::DriverNotFound` if no driver with the given name is
    /// registered, or the factory's own error if its configuration is invalid.
    pub fn create_driver(
        &self,
        name: &str,
        config: &ServoConfig,
    ) -> Result<Box<dyn MotorBus>, BusError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| BusError::DriverNotFound(name.to_string()))?;
        factory(config)
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
