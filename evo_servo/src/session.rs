//! Caller-facing servo session.
//!
//! `ServoSession` owns the bus, the command store and the clock for one
//! axis group. Every operation takes `&mut self`; one executor run is the
//! unit of atomicity.

use crate::clock::{Clock, MonotonicClock};
use crate::command::{CommandState, DegreeMap, ResetMode};
use crate::error::ServoError;
use crate::executor::{MotionProfile, MotionResult, SyncExecutor};
use crate::mode;
use evo_common::servo::bus::{CurrentSupport, MotorBus};
use evo_common::servo::config::ServoConfig;
use evo_common::servo::types::{AxisId, MeasuredState};
use evo_hal::DriverRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// One exclusive session on a motor bus.
pub struct ServoSession<C: Clock = MonotonicClock> {
    config: ServoConfig,
    bus: Box<dyn MotorBus>,
    clock: C,
    command: CommandState,
    last_measured: Option<MeasuredState>,
    stop: Arc<AtomicBool>,
}

impl ServoSession<MonotonicClock> {
    /// Session on `bus` with the wall clock.
    pub fn new(config: ServoConfig, bus: Box<dyn MotorBus>) -> Self {
        Self::with_clock(config, bus, MonotonicClock::new())
    }

    /// Create the bus named by `config.bus.driver` from `registry`.
    pub fn from_registry(
        config: ServoConfig,
        registry: &DriverRegistry,
    ) -> Result<Self, ServoError> {
        let bus = registry.create_driver(&config.bus.driver, &config)?;
        Ok(Self::new(config, bus))
    }
}

impl<C: Clock> ServoSession<C> {
    /// Session on `bus` with an explicit clock.
    pub fn with_clock(config: ServoConfig, bus: Box<dyn MotorBus>, clock: C) -> Self {
        let command = CommandState::new(
            &config.axes.ids,
            config.axes.initial_ticks,
            config.tick_scale(),
        );
        Self {
            config,
            bus,
            clock,
            command,
            last_measured: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the bus.
    pub fn connect(&mut self) -> Result<(), ServoError> {
        info!(
            "Connecting to {} bus on {} @ {} baud (protocol {})",
            self.bus.name(),
            self.config.bus.device,
            self.config.bus.baudrate,
            self.config.bus.protocol
        );
        self.bus.open()?;
        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            debug!("Running in standard (non-RT) mode");
        }
        Ok(())
    }

    /// Close the bus. The command store is kept.
    pub fn close(&mut self) -> Result<(), ServoError> {
        self.bus.close()?;
        Ok(())
    }

    /// Whether the bus is open.
    pub fn is_connected(&self) -> bool {
        self.bus.is_open()
    }

    /// Scan for responding axes.
    pub fn discover(&mut self) -> Result<Vec<AxisId>, ServoError> {
        self.ensure_connected()?;
        Ok(self.bus.discover()?)
    }

    /// Switch every configured axis into extended-position mode.
    pub fn ensure_extended_mode(&mut self) -> Result<(), ServoError> {
        self.ensure_connected()?;
        mode::ensure_extended_mode(
            self.bus.as_mut(),
            &self.config.axes.ids,
            self.config.modes.extended_position,
        )
    }

    /// Read the group and snap the command store to it.
    pub fn reset_to_measured(&mut self, mode: ResetMode) -> Result<(), ServoError> {
        self.ensure_connected()?;
        let measured = self.bus.bulk_read(&self.config.axes.ids, false)?;
        self.command.reset_to_measured(&measured, mode)?;
        info!("Command state reset ({}): {:?}", mode, self.command.goals());
        self.last_measured = Some(measured);
        Ok(())
    }

    /// Overwrite targets (degrees) of the given axes.
    pub fn set_absolute(&mut self, targets: &DegreeMap) -> Result<(), ServoError> {
        self.command.set_absolute(targets)
    }

    /// Nudge targets (degrees) of the given axes relative to their command.
    pub fn set_relative(&mut self, deltas: &DegreeMap) -> Result<(), ServoError> {
        self.command.set_relative(deltas)
    }

    /// Run one synchronized motion to the stored command.
    pub fn execute(&mut self, profile: &MotionProfile) -> Result<MotionResult, ServoError> {
        self.ensure_connected()?;
        let mut executor = SyncExecutor::new(*profile, self.config.tick_scale())
            .with_stop_flag(Arc::clone(&self.stop));
        let result = executor.run(
            self.bus.as_mut(),
            &mut self.clock,
            &self.config.axes.ids,
            self.command.goals(),
        )?;
        self.last_measured = Some(result.final_state.clone());
        Ok(result)
    }

    /// Run one motion with the configured `[motion]` defaults.
    pub fn execute_default(&mut self) -> Result<MotionResult, ServoError> {
        let profile = MotionProfile::from(&self.config.motion);
        self.execute(&profile)
    }

    /// Command store.
    pub fn command(&self) -> &CommandState {
        &self.command
    }

    /// Last telemetry seen by a reset or motion, for diagnostics.
    pub fn last_measured(&self) -> Option<&MeasuredState> {
        self.last_measured.as_ref()
    }

    /// State of the bus's present-current probe.
    pub fn current_support(&self) -> CurrentSupport {
        self.bus.current_support()
    }

    /// Flag that interrupts a running motion when raised.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Lower the stop flag so the next motion can run.
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    /// Session configuration.
    pub fn config(&self) -> &ServoConfig {
        &self.config
    }

    fn ensure_connected(&self) -> Result<(), ServoError> {
        if self.bus.is_open() {
            Ok(())
        } else {
            Err(ServoError::NotConnected)
        }
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling process.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
