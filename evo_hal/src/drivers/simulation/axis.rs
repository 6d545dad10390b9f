//! Servo physics simulator.
//!
//! The `ServoSimulator` models one position-controlled actuator:
//! - First-order response toward the goal with a velocity limit
//! - Motion only while torque is enabled
//! - Single-turn travel clamp unless the extended-position mode is active
//! - Present current proportional to the following error

use evo_common::servo::bus::BusError;
use evo_common::servo::types::{AxisId, AxisSample, Current, Ticks};
use evo_common::servo::units::clamp_ticks;
use std::time::Duration;
use tracing::{debug, trace};

use super::settings::SimulationSettings;

/// Mode code the simulator powers up in (single-turn position).
pub const MODE_POSITION: u8 = 3;

/// Physics simulator for one servo.
#[derive(Debug, Clone)]
pub struct ServoSimulator {
    id: AxisId,
    /// Position in ticks, kept fractional between steps.
    position: f64,
    goal: Ticks,
    mode: u8,
    torque: bool,
    ticks_per_rev: u32,
    extended_mode: u8,
    max_velocity_tps: f64,
    time_constant_s: f64,
    current_per_tick: f64,
}

impl ServoSimulator {
    /// Create a simulator at `position`, torque off, single-turn mode.
    pub fn new(
        id: AxisId,
        position: Ticks,
        ticks_per_rev: u32,
        extended_mode: u8,
        settings: &SimulationSettings,
    ) -> Self {
        Self {
            id,
            position: f64::from(position),
            goal: position,
            mode: MODE_POSITION,
            torque: false,
            ticks_per_rev,
            extended_mode,
            max_velocity_tps: settings.max_velocity_tps,
            time_constant_s: settings.time_constant_s,
            current_per_tick: settings.current_per_tick,
        }
    }

    /// Advance the physics by `dt`.
    pub fn step(&mut self, dt: Duration) {
        if !self.torque {
            return;
        }
        let dt_s = dt.as_secs_f64();
        let error = f64::from(self.goal) - self.position;
        if error == 0.0 || dt_s <= 0.0 {
            return;
        }

        let desired = if self.time_constant_s > 0.0 {
            error * (1.0 - (-dt_s / self.time_constant_s).exp())
        } else {
            error
        };
        let limit = self.max_velocity_tps * dt_s;
        self.position += desired.clamp(-limit, limit);

        // Settle onto the goal once within a fraction of a tick.
        if (f64::from(self.goal) - self.position).abs() < 0.5 {
            self.position = f64::from(self.goal);
        }
        self.position = self.clamp_travel(self.position);
        trace!(axis = self.id, position = self.position, goal = self.goal, "Servo step");
    }

    /// Latch a new goal position.
    pub fn set_goal(&mut self, goal: Ticks) {
        self.goal = if self.is_extended() {
            goal
        } else {
            clamp_ticks(self.clamp_travel(f64::from(goal)) as i64)
        };
    }

    /// Write the operating mode. The firmware rejects this while torque is on.
    pub fn set_mode(&mut self, mode: u8) -> Result<(), BusError> {
        if self.torque {
            return Err(BusError::Transport(format!(
                "axis {}: operating mode is read-only while torque is enabled",
                self.id
            )));
        }
        debug!(axis = self.id, mode, "Operating mode set");
        self.mode = mode;
        Ok(())
    }

    /// Enable or disable torque. Enabling latches the present position as goal.
    pub fn set_torque(&mut self, enabled: bool) {
        if enabled && !self.torque {
            self.goal = self.position();
        }
        self.torque = enabled;
    }

    /// Present position in whole ticks.
    pub fn position(&self) -> Ticks {
        clamp_ticks(self.position.round() as i64)
    }

    /// Latched goal position.
    pub fn goal(&self) -> Ticks {
        self.goal
    }

    /// Active operating mode.
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Torque-enable state.
    pub fn torque_enabled(&self) -> bool {
        self.torque
    }

    /// Present current: following error times gain, zero with torque off.
    pub fn current(&self) -> Current {
        if !self.torque {
            return 0;
        }
        let error = f64::from(self.goal) - self.position;
        (error * self.current_per_tick)
            .round()
            .clamp(f64::from(Current::MIN), f64::from(Current::MAX)) as Current
    }

    /// Telemetry sample, with or without current.
    pub fn sample(&self, with_current: bool) -> AxisSample {
        if with_current {
            AxisSample::with_current(self.position(), self.current())
        } else {
            AxisSample::position_only(self.position())
        }
    }

    fn is_extended(&self) -> bool {
        self.mode == self.extended_mode
    }

    fn clamp_travel(&self, ticks: f64) -> f64 {
        if self.is_extended() {
            ticks
        } else {
            ticks.clamp(0.0, f64::from(self.ticks_per_rev.saturating_sub(1)))
        }
    }
}
