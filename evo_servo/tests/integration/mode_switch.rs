//! Extended-mode sequencing.

use super::support::{BusOp, ScriptedBus};
use evo_common::servo::bus::{BusError, MotorBus};
use evo_servo::error::ServoError;
use evo_servo::mode::{ModeSwitchStep, ensure_extended_mode};

#[test]
fn test_each_axis_disables_sets_enables_in_order() {
    let mut bus = ScriptedBus::new(&[1, 2], Vec::new());
    bus.open().unwrap();
    let log = bus.log();

    ensure_extended_mode(&mut bus, &[1, 2], 4).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            BusOp::SetTorque(1, false),
            BusOp::SetMode(1, 4),
            BusOp::SetTorque(1, true),
            BusOp::SetTorque(2, false),
            BusOp::SetMode(2, 4),
            BusOp::SetTorque(2, true),
        ]
    );
}

#[test]
fn test_failed_mode_write_stops_sequence() {
    let mut bus = ScriptedBus::opened(&[1, 2, 3], Vec::new()).fail_mode_for(2);
    let log = bus.log();

    let err = ensure_extended_mode(&mut bus, &[1, 2, 3], 4).unwrap_err();
    assert!(matches!(err, ServoError::Bus(BusError::Transport(_))));

    // Axis 2 keeps torque off; axis 3 is never touched.
    let ops = log.lock().unwrap().clone();
    assert_eq!(ops.last(), Some(&BusOp::SetMode(2, 4)));
    assert!(!ops.iter().any(|op| matches!(op, BusOp::SetTorque(3, _) | BusOp::SetMode(3, _))));
}

#[test]
fn test_sequence_constant() {
    assert_eq!(
        ModeSwitchStep::SEQUENCE,
        [
            ModeSwitchStep::DisableTorque,
            ModeSwitchStep::SetMode,
            ModeSwitchStep::EnableTorque
        ]
    );
}
