//! Synchronized executor.
//!
//! Streams interpolated waypoints to the whole axis group on an absolute
//! schedule so every axis arrives at the same time, then polls until the
//! group settles within tolerance or a deadline passes.
//!
//! # Phases
//!
//! ```text
//! Idle ──► Streaming ──► Settling ──► Settled
//!              │             └──────► TimedOut
//!              └─(guard / stop)─────► Aborted
//! ```
//!
//! Every run ends with one final bulk read that feeds the [`MotionResult`].

use crate::clock::Clock;
use crate::error::ServoError;
use crate::shaper::{Shaping, waypoints};
use evo_common::consts::{MIN_SETTLE_POLL_HZ, MIN_SETTLE_TIMEOUT_S};
use evo_common::servo::bus::MotorBus;
use evo_common::servo::config::MotionDefaults;
use evo_common::servo::types::{AxisId, Current, CurrentGuard, GoalMap, MeasuredState};
use evo_common::servo::units::TickScale;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Parameters of one synchronized motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    /// Streaming duration in seconds.
    pub duration_s: f64,
    /// Waypoint rate in Hz.
    pub poll_hz: u32,
    /// Settle tolerance in degrees.
    pub epsilon_deg: f64,
    /// Consecutive in-tolerance polls required.
    pub settle_streak: u32,
    /// Settle timeout as a multiple of the duration.
    pub timeout_factor: f64,
    /// Easing curve.
    pub shaping: Shaping,
    /// Guard read every `max(1, poll_hz / guard_divisor)` steps.
    pub guard_divisor: u32,
    /// Optional safe current band.
    pub current_guard: Option<CurrentGuard>,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::from(&MotionDefaults::default())
    }
}

impl From<&MotionDefaults> for MotionProfile {
    fn from(d: &MotionDefaults) -> Self {
        Self {
            duration_s: d.duration_s,
            poll_hz: d.poll_hz,
            epsilon_deg: d.epsilon_deg,
            settle_streak: d.settle_streak,
            timeout_factor: d.timeout_factor,
            shaping: Shaping::from(d.smoothstep),
            guard_divisor: d.guard_divisor,
            current_guard: d.current_guard,
        }
    }
}

impl MotionProfile {
    /// Check the profile before any bus traffic.
    pub fn validate(&self) -> Result<(), ServoError> {
        let invalid = |msg: String| Err(ServoError::InvalidConfiguration(msg));
        if !self.duration_s.is_finite() || self.duration_s < 0.0 {
            return invalid(format!("duration must be finite and >= 0 (got {})", self.duration_s));
        }
        if !self.epsilon_deg.is_finite() {
            return invalid(format!("epsilon must be finite (got {})", self.epsilon_deg));
        }
        if !self.timeout_factor.is_finite() || self.timeout_factor < 0.0 {
            return invalid(format!(
                "timeout factor must be finite and >= 0 (got {})",
                self.timeout_factor
            ));
        }
        for (name, value) in [
            ("duration", self.duration_s),
            ("settle timeout", self.duration_s * self.timeout_factor),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return invalid(format!("{name} of {value} s is out of range"));
            }
        }
        if self.poll_hz == 0 || self.settle_streak == 0 || self.guard_divisor == 0 {
            return invalid(
                "poll rate, settle streak and guard divisor must be greater than 0".to_string(),
            );
        }
        if let Some(guard) = self.current_guard {
            if guard.min > guard.max {
                return invalid(format!(
                    "current guard min ({}) must be <= max ({})",
                    guard.min, guard.max
                ));
            }
        }
        Ok(())
    }

    /// `max(1, round(duration × poll_hz))`.
    pub fn steps(&self) -> u32 {
        let steps = (self.duration_s * f64::from(self.poll_hz)).round();
        (steps as u32).max(1)
    }

    /// Scheduled elapsed time after waypoint `k`: `k × duration / steps`.
    pub fn schedule(&self, k: u32) -> Duration {
        let total = secs(self.duration_s).as_nanos();
        let nanos = total * u128::from(k) / u128::from(self.steps());
        Duration::new(
            (nanos / NANOS_PER_SEC) as u64,
            (nanos % NANOS_PER_SEC) as u32,
        )
    }

    /// Guard read cadence in steps.
    pub fn guard_interval(&self) -> u32 {
        (self.poll_hz / self.guard_divisor.max(1)).max(1)
    }

    /// Sleep between settle polls: `1 / max(5, poll_hz)` seconds.
    pub fn settle_period(&self) -> Duration {
        Duration::from_secs(1) / self.poll_hz.max(MIN_SETTLE_POLL_HZ)
    }

    /// `max(0.2 s, duration × timeout_factor)`.
    pub fn settle_timeout(&self) -> Duration {
        secs((self.duration_s * self.timeout_factor).max(MIN_SETTLE_TIMEOUT_S))
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Seconds as a `Duration`, saturating instead of panicking.
fn secs(value: f64) -> Duration {
    if value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    }
}

/// Lifecycle phase of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorPhase {
    /// No motion in progress.
    #[default]
    Idle,
    /// Writing waypoints.
    Streaming,
    /// Polling for settle.
    Settling,
    /// Group stayed within tolerance for the required streak.
    Settled,
    /// Deadline passed without a qualifying streak.
    TimedOut,
    /// Streaming or settling stopped early (guard trip or stop flag).
    Aborted,
}

/// How a motion ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionOutcome {
    /// Settle streak reached.
    Settled,
    /// Settle deadline passed.
    TimedOut,
    /// A current reading left the guard band during streaming.
    GuardTripped {
        /// Offending axes and their readings.
        axes: Vec<(AxisId, Current)>,
    },
    /// The stop flag was raised.
    Interrupted,
}

impl MotionOutcome {
    /// Terminal executor phase for this outcome.
    pub fn phase(&self) -> ExecutorPhase {
        match self {
            Self::Settled => ExecutorPhase::Settled,
            Self::TimedOut => ExecutorPhase::TimedOut,
            Self::GuardTripped { .. } | Self::Interrupted => ExecutorPhase::Aborted,
        }
    }
}

/// Snapshot returned by one executor run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionResult {
    /// True only for [`MotionOutcome::Settled`].
    pub settled: bool,
    /// How the run ended.
    pub outcome: MotionOutcome,
    /// Positions and currents before the first waypoint.
    pub start: MeasuredState,
    /// Goal of every axis.
    pub goal: GoalMap,
    /// Positions and currents from the final read.
    #[serde(rename = "final")]
    pub final_state: MeasuredState,
    /// Largest `|goal − final|` over the group.
    pub max_err_ticks: i64,
    /// `max_err_ticks` in degrees.
    pub max_err_deg: f64,
    /// Waypoints written.
    pub steps_streamed: u32,
    /// Settle polls performed.
    pub settle_polls: u32,
}

/// Runs synchronized motions for one axis group.
#[derive(Debug)]
pub struct SyncExecutor {
    profile: MotionProfile,
    scale: TickScale,
    stop: Option<Arc<AtomicBool>>,
    phase: ExecutorPhase,
}

impl SyncExecutor {
    /// Executor for `profile` with angles converted through `scale`.
    pub fn new(profile: MotionProfile, scale: TickScale) -> Self {
        Self {
            profile,
            scale,
            stop: None,
            phase: ExecutorPhase::Idle,
        }
    }

    /// Stop streaming and settling once `flag` is raised.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// Profile this executor runs.
    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Phase reached by the last (or current) run.
    pub fn phase(&self) -> ExecutorPhase {
        self.phase
    }

    /// Settle tolerance in ticks: `|deg_to_ticks(epsilon_deg)|`.
    pub fn epsilon_ticks(&self) -> i64 {
        self.scale.deg_to_ticks(self.profile.epsilon_deg).abs()
    }

    /// Drive `axes` from their present positions to `goals`.
    ///
    /// # Errors
    /// Any bus failure aborts the run and is returned as is; nothing is
    /// retried. An invalid profile or a goal for an axis outside `axes` is
    /// `InvalidConfiguration`, detected before any bus traffic.
    pub fn run(
        &mut self,
        bus: &mut dyn MotorBus,
        clock: &mut dyn Clock,
        axes: &[AxisId],
        goals: &GoalMap,
    ) -> Result<MotionResult, ServoError> {
        self.profile.validate()?;
        if let Some(axis) = goals.keys().find(|a| !axes.contains(a)) {
            return Err(ServoError::InvalidConfiguration(format!(
                "goal for axis {axis} outside the motion group"
            )));
        }
        self.phase = ExecutorPhase::Idle;

        let start = read_group(bus, axes)?;
        let steps = self.profile.steps();
        let eps_ticks = self.epsilon_ticks();
        info!(
            "Executing motion: duration={:.3}s steps={} poll={}Hz eps={}deg ({} ticks)",
            self.profile.duration_s, steps, self.profile.poll_hz, self.profile.epsilon_deg, eps_ticks
        );

        let (outcome, steps_streamed, settle_polls) =
            match self.stream(bus, clock, axes, &start, goals)? {
                (Some(early), streamed) => (early, streamed, 0),
                (None, streamed) => {
                    let (outcome, polls) = self.settle(bus, clock, axes, goals, eps_ticks)?;
                    (outcome, streamed, polls)
                }
            };

        let final_state = read_group(bus, axes)?;
        let max_err_ticks = final_state.max_abs_error(goals);
        let max_err_deg = self.scale.ticks_to_deg(max_err_ticks);
        self.phase = outcome.phase();

        match &outcome {
            MotionOutcome::Settled => info!(
                "Motion settled: max_err={} ticks (~{:.2} deg) after {} polls",
                max_err_ticks, max_err_deg, settle_polls
            ),
            MotionOutcome::TimedOut => warn!(
                "Motion not settled: max_err={} ticks (~{:.2} deg)",
                max_err_ticks, max_err_deg
            ),
            MotionOutcome::GuardTripped { .. } | MotionOutcome::Interrupted => warn!(
                "Motion aborted after {}/{} steps: {:?}",
                steps_streamed, steps, outcome
            ),
        }

        Ok(MotionResult {
            settled: outcome == MotionOutcome::Settled,
            outcome,
            start,
            goal: goals.clone(),
            final_state,
            max_err_ticks,
            max_err_deg,
            steps_streamed,
            settle_polls,
        })
    }

    /// Write waypoints `1..=steps`. Returns an outcome only on early stop.
    fn stream(
        &mut self,
        bus: &mut dyn MotorBus,
        clock: &mut dyn Clock,
        axes: &[AxisId],
        start: &MeasuredState,
        goals: &GoalMap,
    ) -> Result<(Option<MotionOutcome>, u32), ServoError> {
        self.phase = ExecutorPhase::Streaming;
        let steps = self.profile.steps();
        let guard_interval = self.profile.guard_interval();
        let t0 = clock.now();

        for k in 1..=steps {
            if self.stop_requested() {
                return Ok((Some(MotionOutcome::Interrupted), k - 1));
            }

            let a = self.profile.shaping.shape(f64::from(k) / f64::from(steps));
            let targets = waypoints(start, goals, a);
            bus.sync_write(&targets)?;
            trace!(step = k, "Waypoint written: {:?}", targets);

            if let Some(guard) = self.profile.current_guard {
                if k % guard_interval == 0 {
                    let state = read_group(bus, axes)?;
                    let violations = guard.violations(&state);
                    if !violations.is_empty() {
                        warn!(
                            step = k,
                            "Current out of range [{}, {}], stopping: {:?}",
                            guard.min, guard.max, violations
                        );
                        return Ok((Some(MotionOutcome::GuardTripped { axes: violations }), k));
                    }
                }
            }

            clock.sleep_until(t0.saturating_add(self.profile.schedule(k)));
        }
        Ok((None, steps))
    }

    /// Poll until the streak is reached, the deadline passes, or a stop.
    fn settle(
        &mut self,
        bus: &mut dyn MotorBus,
        clock: &mut dyn Clock,
        axes: &[AxisId],
        goals: &GoalMap,
        eps_ticks: i64,
    ) -> Result<(MotionOutcome, u32), ServoError> {
        self.phase = ExecutorPhase::Settling;
        let deadline = clock.now().saturating_add(self.profile.settle_timeout());
        let period = self.profile.settle_period();
        let mut streak = 0;
        let mut polls = 0;
        let mut last_err = None;

        while clock.now() < deadline {
            if self.stop_requested() {
                return Ok((MotionOutcome::Interrupted, polls));
            }

            let state = read_group(bus, axes)?;
            polls += 1;
            let max_err = state.max_abs_error(goals);
            last_err = Some(max_err);

            if max_err <= eps_ticks {
                streak += 1;
                if streak >= self.profile.settle_streak {
                    return Ok((MotionOutcome::Settled, polls));
                }
            } else {
                streak = 0;
            }
            debug!(poll = polls, max_err, streak, "Settle poll");

            clock.sleep(period);
        }

        debug!("Settle deadline passed, last max_err={:?}", last_err);
        Ok((MotionOutcome::TimedOut, polls))
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// One current-bearing read of the whole group; every position is required.
fn read_group(bus: &mut dyn MotorBus, axes: &[AxisId]) -> Result<MeasuredState, ServoError> {
    let state = bus.bulk_read(axes, true)?;
    state.require_positions(axes)?;
    Ok(state)
}
