//! Streaming and settle detection against a scripted bus.

use super::support::{BusOp, ScriptedBus, current_requests, goals, positions, readings, writes};
use evo_common::servo::bus::{BusError, CurrentSupport, MotorBus};
use evo_common::servo::types::{AxisSample, MeasuredState};
use evo_common::servo::units::TickScale;
use evo_servo::clock::{Clock, ManualClock};
use evo_servo::error::ServoError;
use evo_servo::executor::{ExecutorPhase, MotionOutcome, MotionProfile, SyncExecutor};
use evo_servo::shaper::Shaping;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const SCALE: TickScale = TickScale::new(4096);
const GOAL: i32 = 1000;

/// 0.1 s at 25 Hz: 3 waypoints, then a 0.2 s settle window polled every
/// 40 ms, which fits exactly five polls. Tolerance is 2 ticks, streak 3.
fn settle_profile() -> MotionProfile {
    MotionProfile {
        duration_s: 0.1,
        poll_hz: 25,
        epsilon_deg: SCALE.ticks_to_deg(2),
        settle_streak: 3,
        timeout_factor: 2.0,
        shaping: Shaping::Smoothstep,
        guard_divisor: 10,
        current_guard: None,
    }
}

/// Start read at 0, then one settle poll per entry of `errors`.
fn settle_script(errors: &[i32]) -> Vec<MeasuredState> {
    let mut reads = vec![positions(&[(1, 0)])];
    reads.extend(errors.iter().map(|e| positions(&[(1, GOAL - e)])));
    reads
}

#[test]
fn test_settles_on_third_consecutive_poll() {
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[5, 5, 1, 1, 1]));
    let mut clock = ManualClock::new();
    let mut exec = SyncExecutor::new(settle_profile(), SCALE);
    assert_eq!(exec.epsilon_ticks(), 2);

    let result = exec
        .run(&mut bus, &mut clock, &[1], &goals(&[(1, GOAL)]))
        .unwrap();

    assert!(result.settled);
    assert_eq!(result.outcome, MotionOutcome::Settled);
    assert_eq!(result.settle_polls, 5);
    assert_eq!(result.steps_streamed, 3);
    assert_eq!(result.max_err_ticks, 1);
    assert_eq!(result.max_err_deg, SCALE.ticks_to_deg(1));
    assert_eq!(exec.phase(), ExecutorPhase::Settled);
}

#[test]
fn test_streak_must_be_contiguous() {
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[1, 1, 5, 1, 1]));
    let mut clock = ManualClock::new();
    let mut exec = SyncExecutor::new(settle_profile(), SCALE);

    let result = exec
        .run(&mut bus, &mut clock, &[1], &goals(&[(1, GOAL)]))
        .unwrap();

    assert!(!result.settled);
    assert_eq!(result.outcome, MotionOutcome::TimedOut);
    assert_eq!(result.settle_polls, 5);
    assert_eq!(exec.phase(), ExecutorPhase::TimedOut);
    // Stream (100 ms) plus the 200 ms settle window.
    assert_eq!(clock.now(), Duration::from_millis(300));
}

#[test]
fn test_streak_completes_after_reset() {
    let mut profile = settle_profile();
    profile.timeout_factor = 10.0;
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[1, 1, 5, 1, 1, 1]));
    let mut clock = ManualClock::new();

    let result = SyncExecutor::new(profile, SCALE)
        .run(&mut bus, &mut clock, &[1], &goals(&[(1, GOAL)]))
        .unwrap();

    assert!(result.settled);
    assert_eq!(result.settle_polls, 6);
}

#[test]
fn test_streams_paced_waypoints_ending_at_goal() {
    let mut profile = settle_profile();
    profile.duration_s = 1.0;
    profile.poll_hz = 10;
    let mut bus = ScriptedBus::opened(&[1, 2], vec![
        positions(&[(1, 0), (2, 500)]),
        positions(&[(1, GOAL), (2, -GOAL)]),
    ]);
    let log = bus.log();
    let mut clock = ManualClock::new();

    let result = SyncExecutor::new(profile, SCALE)
        .run(&mut bus, &mut clock, &[1, 2], &goals(&[(1, GOAL), (2, -GOAL)]))
        .unwrap();
    assert!(result.settled);
    assert_eq!(result.settle_polls, 3);

    let written = writes(&log);
    assert_eq!(written.len(), 10);
    // smoothstep(0.5) = 0.5
    assert_eq!(written[4], goals(&[(1, 500), (2, -250)]));
    assert_eq!(written[9], goals(&[(1, GOAL), (2, -GOAL)]));
    for pair in written.windows(2) {
        assert!(pair[1][&1] >= pair[0][&1], "axis 1 must advance monotonically");
    }
    // 1 s stream, then 100 ms between the three settle polls.
    assert_eq!(clock.now(), Duration::from_millis(1200));
}

#[test]
fn test_linear_shaping_writes_even_steps() {
    let mut profile = settle_profile();
    profile.duration_s = 0.4;
    profile.poll_hz = 10;
    profile.shaping = Shaping::Linear;
    let mut bus = ScriptedBus::opened(&[1], vec![positions(&[(1, 0)]), positions(&[(1, 400)])]);
    let log = bus.log();

    SyncExecutor::new(profile, SCALE)
        .run(&mut bus, &mut ManualClock::new(), &[1], &goals(&[(1, 400)]))
        .unwrap();

    let steps: Vec<i32> = writes(&log).iter().map(|g| g[&1]).collect();
    assert_eq!(steps, vec![100, 200, 300, 400]);
}

#[test]
fn test_every_run_ends_with_final_read() {
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[0, 0, 0]));
    let log = bus.log();
    SyncExecutor::new(settle_profile(), SCALE)
        .run(&mut bus, &mut ManualClock::new(), &[1], &goals(&[(1, GOAL)]))
        .unwrap();

    let ops = log.lock().unwrap().clone();
    assert!(matches!(ops.first(), Some(BusOp::BulkRead { .. })));
    assert!(matches!(ops.last(), Some(BusOp::BulkRead { .. })));
    // start + 3 settle polls + final
    assert_eq!(current_requests(&log).len(), 5);
}

#[test]
fn test_missing_current_degrades_once() {
    let mut start = readings(&[(1, 0, 10)]);
    start.insert(2, AxisSample::position_only(0));
    let mut bus = ScriptedBus::opened(&[1, 2], vec![start, positions(&[(1, GOAL), (2, GOAL)])]);
    let log = bus.log();

    let result = SyncExecutor::new(settle_profile(), SCALE)
        .run(&mut bus, &mut ManualClock::new(), &[1, 2], &goals(&[(1, GOAL), (2, GOAL)]))
        .unwrap();

    assert!(result.settled);
    assert_eq!(bus.current_support(), CurrentSupport::Unsupported);
    let requests = current_requests(&log);
    assert!(requests.len() > 2);
    assert!(requests[0]);
    assert!(requests[1..].iter().all(|r| !r));
    assert_eq!(result.final_state.current(1), None);
}

#[test]
fn test_transport_failure_is_fatal() {
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[0])).fail_write_at(2);
    let log = bus.log();

    let err = SyncExecutor::new(settle_profile(), SCALE)
        .run(&mut bus, &mut ManualClock::new(), &[1], &goals(&[(1, GOAL)]))
        .unwrap_err();

    assert!(matches!(err, ServoError::Bus(BusError::Transport(_))));
    assert!(err.is_bus());
    assert_eq!(writes(&log).len(), 1);
    // Only the start read; no settle polls and no final read.
    assert_eq!(current_requests(&log).len(), 1);
}

#[test]
fn test_missing_position_is_fatal() {
    let mut bus = ScriptedBus::opened(&[1, 2], vec![positions(&[(1, 0)])]);
    let err = SyncExecutor::new(settle_profile(), SCALE)
        .run(&mut bus, &mut ManualClock::new(), &[1, 2], &goals(&[(1, 0), (2, 0)]))
        .unwrap_err();
    assert!(matches!(
        err,
        ServoError::Bus(BusError::TelemetryUnavailable { axis: 2, .. })
    ));
}

#[test]
fn test_goal_outside_group_rejected_before_traffic() {
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[0]));
    let log = bus.log();
    let err = SyncExecutor::new(settle_profile(), SCALE)
        .run(&mut bus, &mut ManualClock::new(), &[1], &goals(&[(1, 0), (7, 0)]))
        .unwrap_err();
    assert!(matches!(err, ServoError::InvalidConfiguration(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_stop_flag_interrupts_streaming() {
    let stop = Arc::new(AtomicBool::new(false));
    let mut profile = settle_profile();
    profile.duration_s = 1.0;
    profile.poll_hz = 10;
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[0]))
        .stop_after_writes(4, Arc::clone(&stop));
    let log = bus.log();

    let mut exec = SyncExecutor::new(profile, SCALE).with_stop_flag(stop);
    let result = exec
        .run(&mut bus, &mut ManualClock::new(), &[1], &goals(&[(1, GOAL)]))
        .unwrap();

    assert_eq!(result.outcome, MotionOutcome::Interrupted);
    assert!(!result.settled);
    assert_eq!(result.steps_streamed, 4);
    assert_eq!(result.settle_polls, 0);
    assert_eq!(writes(&log).len(), 4);
    assert_eq!(exec.phase(), ExecutorPhase::Aborted);
}

#[test]
fn test_invalid_profile_rejected() {
    let mut profile = settle_profile();
    profile.poll_hz = 0;
    let mut bus = ScriptedBus::opened(&[1], settle_script(&[0]));
    assert!(matches!(
        SyncExecutor::new(profile, SCALE).run(
            &mut bus,
            &mut ManualClock::new(),
            &[1],
            &goals(&[(1, 0)])
        ),
        Err(ServoError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_out_of_range_durations_rejected_before_bus_traffic() {
    let huge_duration = MotionProfile {
        duration_s: 1e20,
        ..settle_profile()
    };
    let huge_timeout = MotionProfile {
        timeout_factor: 1e20,
        ..settle_profile()
    };

    for profile in [huge_duration, huge_timeout] {
        let mut bus = ScriptedBus::opened(&[1], settle_script(&[0]));
        let log = bus.log();
        let result = SyncExecutor::new(profile, SCALE).run(
            &mut bus,
            &mut ManualClock::new(),
            &[1],
            &goals(&[(1, 0)]),
        );
        assert!(matches!(result, Err(ServoError::InvalidConfiguration(_))));
        assert!(log.lock().unwrap().is_empty());
    }
}
