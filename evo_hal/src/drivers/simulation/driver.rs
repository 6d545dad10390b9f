//! Simulation bus implementation.
//!
//! The `SimulatedBus` implements the `MotorBus` trait on top of one
//! `ServoSimulator` per configured axis, for development and testing without
//! physical hardware.

use super::axis::ServoSimulator;
use super::settings::SimulationSettings;
use super::DRIVER_NAME;
use evo_common::servo::bus::{BusError, CurrentSupport, MotorBus};
use evo_common::servo::config::ServoConfig;
use evo_common::servo::types::{AxisId, GoalMap, MeasuredState};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// How simulated time advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimTime {
    /// Physics follows the wall clock between bus transactions.
    Realtime,
    /// Every read or write advances physics by a fixed step.
    PerTransaction(Duration),
    /// Physics only moves through [`SimulatedBus::advance`].
    Manual,
}

/// Transaction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Completed bulk reads.
    pub bulk_reads: u64,
    /// Bulk reads that requested present current.
    pub current_requests: u64,
    /// Completed sync writes.
    pub sync_writes: u64,
    /// Operating-mode register writes.
    pub mode_writes: u64,
    /// Torque-enable register writes.
    pub torque_writes: u64,
}

/// Simulated servo bus.
pub struct SimulatedBus {
    open: bool,
    axes: BTreeMap<AxisId, ServoSimulator>,
    offline: HashSet<AxisId>,
    supports_current: bool,
    current_support: CurrentSupport,
    time: SimTime,
    last_tick: Option<Instant>,
    stats: BusStats,
}

impl SimulatedBus {
    /// Build the bus from the servo configuration and its
    /// `[driver_config.simulation]` section.
    pub fn new(config: &ServoConfig) -> Result<Self, BusError> {
        let settings = SimulationSettings::from_section(config.driver_section(DRIVER_NAME))?;
        Self::with_settings(config, &settings)
    }

    /// Build the bus with explicit settings.
    pub fn with_settings(
        config: &ServoConfig,
        settings: &SimulationSettings,
    ) -> Result<Self, BusError> {
        let initial = settings.initial_positions()?;
        if let Some(id) = initial.keys().find(|id| !config.axes.ids.contains(id)) {
            return Err(BusError::ConfigError(format!(
                "driver_config.simulation.initial_positions: axis {id} is not configured"
            )));
        }

        let axes = config
            .axes
            .ids
            .iter()
            .map(|&id| {
                let position = initial.get(&id).copied().unwrap_or(0);
                let servo = ServoSimulator::new(
                    id,
                    position,
                    config.axes.ticks_per_rev,
                    config.modes.extended_position,
                    settings,
                );
                (id, servo)
            })
            .collect();

        Ok(Self {
            open: false,
            axes,
            offline: settings.offline_ids.iter().copied().collect(),
            supports_current: settings.supports_current,
            current_support: CurrentSupport::Unknown,
            time: SimTime::Realtime,
            last_tick: None,
            stats: BusStats::default(),
        })
    }

    /// Select how simulated time advances.
    pub fn set_time_mode(&mut self, time: SimTime) {
        self.time = time;
        self.last_tick = None;
    }

    /// Advance every servo by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        for servo in self.axes.values_mut() {
            servo.step(dt);
        }
    }

    /// Simulator for `axis`, if configured.
    pub fn axis(&self, axis: AxisId) -> Option<&ServoSimulator> {
        self.axes.get(&axis)
    }

    /// Transaction counters since creation.
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    fn tick(&mut self) {
        match self.time {
            SimTime::Realtime => {
                let now = Instant::now();
                if let Some(last) = self.last_tick {
                    self.advance(now.duration_since(last));
                }
                self.last_tick = Some(now);
            }
            SimTime::PerTransaction(dt) => self.advance(dt),
            SimTime::Manual => {}
        }
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.open { Ok(()) } else { Err(BusError::NotOpen) }
    }

    fn online_servo(&mut self, axis: AxisId) -> Result<&mut ServoSimulator, BusError> {
        if self.offline.contains(&axis) {
            return Err(BusError::Transport(format!("axis {axis}: no status packet")));
        }
        self.axes.get_mut(&axis).ok_or(BusError::UnknownAxis(axis))
    }
}

impl MotorBus for SimulatedBus {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn open(&mut self) -> Result<(), BusError> {
        if !self.open {
            info!("Opening simulated bus with {} servos", self.axes.len());
            self.open = true;
            self.last_tick = None;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), BusError> {
        if self.open {
            info!("Closing simulated bus");
            self.open = false;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn discover(&mut self) -> Result<Vec<AxisId>, BusError> {
        self.ensure_open()?;
        let found: Vec<AxisId> = self
            .axes
            .keys()
            .copied()
            .filter(|id| !self.offline.contains(id))
            .collect();
        debug!("Scan found {} servos: {:?}", found.len(), found);
        Ok(found)
    }

    fn set_mode(&mut self, axis: AxisId, mode: u8) -> Result<(), BusError> {
        self.ensure_open()?;
        self.online_servo(axis)?.set_mode(mode)?;
        self.stats.mode_writes += 1;
        Ok(())
    }

    fn set_torque(&mut self, axis: AxisId, enabled: bool) -> Result<(), BusError> {
        self.ensure_open()?;
        self.online_servo(axis)?.set_torque(enabled);
        self.stats.torque_writes += 1;
        Ok(())
    }

    fn bulk_read(
        &mut self,
        axes: &[AxisId],
        want_current: bool,
    ) -> Result<MeasuredState, BusError> {
        self.ensure_open()?;
        self.tick();

        let request_current = self.current_support.should_request(want_current);
        let with_current = request_current && self.supports_current;

        let mut state = MeasuredState::new();
        for &axis in axes {
            let servo = self.axes.get(&axis).ok_or(BusError::UnknownAxis(axis))?;
            if self.offline.contains(&axis) {
                continue;
            }
            state.insert(axis, servo.sample(with_current));
        }
        state.require_positions(axes)?;

        if request_current {
            self.stats.current_requests += 1;
            self.current_support.observe(with_current);
        }
        self.stats.bulk_reads += 1;
        trace!("Bulk read: {:?}", state);
        Ok(state)
    }

    fn sync_write(&mut self, goals: &GoalMap) -> Result<(), BusError> {
        self.ensure_open()?;
        for &axis in goals.keys() {
            if !self.axes.contains_key(&axis) {
                return Err(BusError::UnknownAxis(axis));
            }
            if self.offline.contains(&axis) {
                return Err(BusError::Transport(format!("axis {axis}: sync write failed")));
            }
        }

        for (&axis, &goal) in goals {
            if let Some(servo) = self.axes.get_mut(&axis) {
                servo.set_goal(goal);
            }
        }
        self.stats.sync_writes += 1;
        self.tick();
        Ok(())
    }

    fn current_support(&self) -> CurrentSupport {
        self.current_support
    }
}
