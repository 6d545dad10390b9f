//! Scripted bus and fixtures shared by the integration tests.

use evo_common::servo::bus::{BusError, CurrentSupport, MotorBus};
use evo_common::servo::types::{AxisId, AxisSample, Current, GoalMap, MeasuredState, Ticks};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded bus call.
#[derive(Debug, Clone, PartialEq)]
pub enum BusOp {
    Discover,
    SetMode(AxisId, u8),
    SetTorque(AxisId, bool),
    /// `requested_current` is whether current was actually asked for.
    BulkRead { requested_current: bool },
    SyncWrite(GoalMap),
}

/// Bus that replays a fixed sequence of reads and records every call.
///
/// Once the script is exhausted the last read repeats.
pub struct ScriptedBus {
    open: bool,
    online: Vec<AxisId>,
    reads: VecDeque<MeasuredState>,
    last_read: MeasuredState,
    support: CurrentSupport,
    log: Arc<Mutex<Vec<BusOp>>>,
    writes: usize,
    fail_write_at: Option<usize>,
    fail_mode_for: Option<AxisId>,
    stop_after_writes: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedBus {
    pub fn new(online: &[AxisId], reads: Vec<MeasuredState>) -> Self {
        Self {
            open: false,
            online: online.to_vec(),
            reads: reads.into(),
            last_read: MeasuredState::new(),
            support: CurrentSupport::Unknown,
            log: Arc::new(Mutex::new(Vec::new())),
            writes: 0,
            fail_write_at: None,
            fail_mode_for: None,
            stop_after_writes: None,
        }
    }

    /// Open bus, for direct executor use.
    pub fn opened(online: &[AxisId], reads: Vec<MeasuredState>) -> Self {
        let mut bus = Self::new(online, reads);
        bus.open = true;
        bus
    }

    /// Fail the `n`th sync write (1-based).
    pub fn fail_write_at(mut self, n: usize) -> Self {
        self.fail_write_at = Some(n);
        self
    }

    /// Fail the mode write for `axis`.
    pub fn fail_mode_for(mut self, axis: AxisId) -> Self {
        self.fail_mode_for = Some(axis);
        self
    }

    /// Raise `flag` right after the `n`th sync write.
    pub fn stop_after_writes(mut self, n: usize, flag: Arc<AtomicBool>) -> Self {
        self.stop_after_writes = Some((n, flag));
        self
    }

    /// Shared handle on the call log, usable after the bus is boxed.
    pub fn log(&self) -> Arc<Mutex<Vec<BusOp>>> {
        Arc::clone(&self.log)
    }

    fn record(&self, op: BusOp) {
        self.log.lock().unwrap().push(op);
    }
}

impl MotorBus for ScriptedBus {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&mut self) -> Result<(), BusError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BusError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn discover(&mut self) -> Result<Vec<AxisId>, BusError> {
        self.record(BusOp::Discover);
        Ok(self.online.clone())
    }

    fn set_mode(&mut self, axis: AxisId, mode: u8) -> Result<(), BusError> {
        self.record(BusOp::SetMode(axis, mode));
        if self.fail_mode_for == Some(axis) {
            return Err(BusError::Transport(format!("axis {axis}: access error")));
        }
        Ok(())
    }

    fn set_torque(&mut self, axis: AxisId, enabled: bool) -> Result<(), BusError> {
        self.record(BusOp::SetTorque(axis, enabled));
        Ok(())
    }

    fn bulk_read(
        &mut self,
        _axes: &[AxisId],
        want_current: bool,
    ) -> Result<MeasuredState, BusError> {
        if !self.open {
            return Err(BusError::NotOpen);
        }
        let requested_current = self.support.should_request(want_current);
        self.record(BusOp::BulkRead { requested_current });

        if let Some(next) = self.reads.pop_front() {
            self.last_read = next;
        }
        let mut state = MeasuredState::new();
        for (axis, sample) in self.last_read.iter() {
            let sample = if requested_current {
                *sample
            } else {
                AxisSample::position_only(sample.position)
            };
            state.insert(axis, sample);
        }
        if requested_current {
            self.support.observe(state.has_all_currents());
        }
        Ok(state)
    }

    fn sync_write(&mut self, goals: &GoalMap) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::NotOpen);
        }
        self.writes += 1;
        if self.fail_write_at == Some(self.writes) {
            return Err(BusError::Transport("sync write: no echo".to_string()));
        }
        self.record(BusOp::SyncWrite(goals.clone()));
        if let Some((n, flag)) = &self.stop_after_writes {
            if self.writes == *n {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn current_support(&self) -> CurrentSupport {
        self.support
    }
}

/// Read carrying positions only.
pub fn positions(pairs: &[(AxisId, Ticks)]) -> MeasuredState {
    let mut state = MeasuredState::new();
    for &(axis, position) in pairs {
        state.insert(axis, AxisSample::position_only(position));
    }
    state
}

/// Read carrying positions and currents.
pub fn readings(samples: &[(AxisId, Ticks, Current)]) -> MeasuredState {
    let mut state = MeasuredState::new();
    for &(axis, position, current) in samples {
        state.insert(axis, AxisSample::with_current(position, current));
    }
    state
}

/// Sync writes recorded so far.
pub fn writes(log: &Arc<Mutex<Vec<BusOp>>>) -> Vec<GoalMap> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|op| match op {
            BusOp::SyncWrite(goals) => Some(goals.clone()),
            _ => None,
        })
        .collect()
}

/// Current-request flags of the bulk reads recorded so far.
pub fn current_requests(log: &Arc<Mutex<Vec<BusOp>>>) -> Vec<bool> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|op| match op {
            BusOp::BulkRead { requested_current } => Some(*requested_current),
            _ => None,
        })
        .collect()
}

pub fn goals(pairs: &[(AxisId, Ticks)]) -> GoalMap {
    pairs.iter().copied().collect()
}
