//! Caller-facing session over a scripted bus.

use super::support::{BusOp, ScriptedBus, goals, positions, writes};
use evo_common::servo::config::ServoConfig;
use evo_servo::clock::ManualClock;
use evo_servo::command::{DegreeMap, ResetMode};
use evo_servo::error::ServoError;
use evo_servo::executor::{MotionOutcome, MotionProfile};
use evo_servo::session::ServoSession;
use std::sync::atomic::Ordering;

fn degrees(pairs: &[(u8, f64)]) -> DegreeMap {
    pairs.iter().copied().collect()
}

fn session(bus: ScriptedBus) -> ServoSession<ManualClock> {
    ServoSession::with_clock(ServoConfig::for_axes(&[1, 2]), Box::new(bus), ManualClock::new())
}

#[test]
fn test_bus_operations_require_connection() {
    let mut s = session(ScriptedBus::new(&[1, 2], Vec::new()));
    assert!(!s.is_connected());
    assert!(matches!(s.discover(), Err(ServoError::NotConnected)));
    assert!(matches!(s.ensure_extended_mode(), Err(ServoError::NotConnected)));
    assert!(matches!(
        s.reset_to_measured(ResetMode::ToPresent),
        Err(ServoError::NotConnected)
    ));
    assert!(matches!(s.execute_default(), Err(ServoError::NotConnected)));

    // Command store is usable offline.
    s.set_absolute(&degrees(&[(1, 90.0)])).unwrap();
    assert_eq!(s.command().get(1), Some(1024));
}

#[test]
fn test_connect_discover_close() {
    let mut s = session(ScriptedBus::new(&[2], Vec::new()));
    s.connect().unwrap();
    assert!(s.is_connected());
    assert_eq!(s.discover().unwrap(), vec![2]);
    s.close().unwrap();
    assert!(!s.is_connected());
}

#[test]
fn test_nudges_accumulate_on_command_not_measurement() {
    let bus = ScriptedBus::new(&[1, 2], vec![positions(&[(1, 4100), (2, -10)])]);
    let mut s = session(bus);
    s.connect().unwrap();

    s.reset_to_measured(ResetMode::ToPresent).unwrap();
    assert_eq!(s.command().goals(), &goals(&[(1, 4100), (2, -10)]));
    assert_eq!(s.last_measured(), Some(&positions(&[(1, 4100), (2, -10)])));

    s.set_relative(&degrees(&[(1, 0.05)])).unwrap();
    s.set_relative(&degrees(&[(1, 0.05)])).unwrap();
    // Each 0.05 deg nudge rounds to 1 tick on its own.
    assert_eq!(s.command().get(1), Some(4102));
    assert_eq!(s.command().get(2), Some(-10));

    s.reset_to_measured(ResetMode::ToNearestTurn).unwrap();
    assert_eq!(s.command().goals(), &goals(&[(1, 4096), (2, 0)]));
}

#[test]
fn test_execute_moves_to_command_and_caches_final() {
    let bus = ScriptedBus::new(&[1, 2], vec![
        positions(&[(1, 0), (2, 0)]),
        positions(&[(1, 1024), (2, -512)]),
    ]);
    let log = bus.log();
    let mut s = session(bus);
    s.connect().unwrap();
    s.set_absolute(&degrees(&[(1, 90.0), (2, -45.0)])).unwrap();

    let profile = MotionProfile {
        duration_s: 0.5,
        poll_hz: 20,
        ..MotionProfile::default()
    };
    let result = s.execute(&profile).unwrap();

    assert!(result.settled);
    assert_eq!(result.goal, goals(&[(1, 1024), (2, -512)]));
    assert_eq!(writes(&log).last(), Some(&goals(&[(1, 1024), (2, -512)])));
    assert_eq!(s.last_measured(), Some(&result.final_state));
}

#[test]
fn test_interrupt_keeps_command_and_allows_return_to_zero() {
    let mut s = session(ScriptedBus::new(&[1, 2], vec![
        positions(&[(1, 0), (2, 0)]),
        positions(&[(1, 0), (2, 0)]),
    ]));
    s.connect().unwrap();
    s.set_absolute(&degrees(&[(1, 180.0), (2, 180.0)])).unwrap();

    let stop = s.stop_flag();
    stop.store(true, Ordering::SeqCst);
    let result = s.execute_default().unwrap();
    assert_eq!(result.outcome, MotionOutcome::Interrupted);
    assert_eq!(result.steps_streamed, 0);
    assert_eq!(s.command().get(1), Some(2048));

    // Deliberate final command once the flag is lowered.
    s.clear_stop();
    s.set_absolute(&degrees(&[(1, 0.0), (2, 0.0)])).unwrap();
    let home = s.execute_default().unwrap();
    assert!(home.settled);
    assert_eq!(home.max_err_ticks, 0);
}

#[test]
fn test_ensure_extended_mode_uses_configured_code() {
    let mut config = ServoConfig::for_axes(&[3]);
    config.modes.extended_position = 5;
    let bus = ScriptedBus::new(&[3], Vec::new());
    let log = bus.log();
    let mut s = ServoSession::with_clock(config, Box::new(bus), ManualClock::new());
    s.connect().unwrap();
    s.ensure_extended_mode().unwrap();
    assert!(log.lock().unwrap().contains(&BusOp::SetMode(3, 5)));
}

#[test]
fn test_invalid_reset_mode_string() {
    let err = "snap".parse::<ResetMode>().unwrap_err();
    assert!(err.to_string().contains("to_nearest_turn"));
}
