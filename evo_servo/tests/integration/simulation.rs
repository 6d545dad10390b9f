//! End-to-end motions on the simulation driver.

use evo_common::config::ConfigLoader;
use evo_common::servo::bus::{CurrentSupport, MotorBus};
use evo_common::servo::config::ServoConfig;
use evo_hal::DriverRegistry;
use evo_hal::drivers::simulation::{SimTime, SimulatedBus, SimulationSettings};
use evo_servo::clock::ManualClock;
use evo_servo::command::DegreeMap;
use evo_servo::executor::{MotionOutcome, MotionProfile, SyncExecutor};
use evo_servo::session::ServoSession;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[shared]
service_name = "sim-bench"

[bus]
driver = "simulation"

[axes]
ids = [1, 2, 3]
ticks_per_rev = 4096

[motion]
duration_s = 1.0
poll_hz = 50
epsilon_deg = 1.0

[driver_config.simulation]
time_constant_s = 0.02
offline_ids = [3]
"#;

/// Physics advances 20 ms per bus transaction, matching the 50 Hz stream.
fn simulated_bus(config: &ServoConfig, settings: SimulationSettings) -> SimulatedBus {
    let mut bus = SimulatedBus::with_settings(config, &settings).unwrap();
    bus.set_time_mode(SimTime::PerTransaction(Duration::from_millis(20)));
    bus
}

fn degrees(pairs: &[(u8, f64)]) -> DegreeMap {
    pairs.iter().copied().collect()
}

#[test]
fn test_multi_turn_motion_settles() {
    let config = ServoConfig::for_axes(&[1, 2]);
    let bus = simulated_bus(&config, SimulationSettings::default());
    let mut session = ServoSession::with_clock(config, Box::new(bus), ManualClock::new());

    session.connect().unwrap();
    session.ensure_extended_mode().unwrap();
    session
        .set_absolute(&degrees(&[(1, 90.0), (2, -450.0)]))
        .unwrap();
    let result = session.execute_default().unwrap();

    assert!(result.settled, "result: {result:?}");
    assert_eq!(result.outcome, MotionOutcome::Settled);
    assert!(result.max_err_ticks <= 23);
    let final_2 = result.final_state.position(2).unwrap();
    assert!((final_2 + 5120).abs() <= 23, "axis 2 at {final_2}");
    assert_eq!(session.current_support(), CurrentSupport::Supported);
    assert!(result.final_state.has_all_currents());
}

#[test]
fn test_motion_without_mode_switch_stays_put() {
    let config = ServoConfig::for_axes(&[1]);
    let bus = simulated_bus(&config, SimulationSettings::default());
    let mut session = ServoSession::with_clock(config, Box::new(bus), ManualClock::new());

    session.connect().unwrap();
    session.set_absolute(&degrees(&[(1, -90.0)])).unwrap();
    let profile = MotionProfile {
        duration_s: 0.2,
        ..MotionProfile::default()
    };
    let result = session.execute(&profile).unwrap();

    // Torque never enabled without the mode switch: the servo stays put.
    assert!(!result.settled);
    assert_eq!(result.outcome, MotionOutcome::TimedOut);
    assert_eq!(result.final_state.position(1), Some(0));
    assert_eq!(result.max_err_ticks, 1024);
}

#[test]
fn test_unsupported_current_requested_once_per_session() {
    let config = ServoConfig::for_axes(&[1, 2]);
    let settings = SimulationSettings {
        supports_current: false,
        ..SimulationSettings::default()
    };
    let mut bus = simulated_bus(&config, settings);
    bus.open().unwrap();
    bus.set_torque(1, true).unwrap();
    bus.set_torque(2, true).unwrap();
    let mut clock = ManualClock::new();
    let goals = [(1, 512), (2, 512)].into_iter().collect();
    let profile = MotionProfile::from(&config.motion);

    for _ in 0..2 {
        let result = SyncExecutor::new(profile, config.tick_scale())
            .run(&mut bus, &mut clock, &[1, 2], &goals)
            .unwrap();
        assert!(result.settled);
        assert_eq!(result.final_state.current(1), None);
    }
    assert_eq!(bus.current_support(), CurrentSupport::Unsupported);
    assert_eq!(bus.stats().current_requests, 1);
    assert!(bus.stats().bulk_reads > 4);
}

#[test]
fn test_session_from_config_file_and_registry() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{CONFIG}").unwrap();
    file.flush().unwrap();

    let config = ServoConfig::load_validated(file.path()).unwrap();
    assert_eq!(config.motion.epsilon_deg, 1.0);

    let registry = DriverRegistry::with_builtin_drivers();
    let mut session = ServoSession::from_registry(config, &registry).unwrap();
    session.connect().unwrap();
    assert_eq!(session.discover().unwrap(), vec![1, 2]);
    session.close().unwrap();
}

#[test]
fn test_offline_axis_fails_motion() {
    let config = ServoConfig::from_toml(CONFIG).unwrap();
    let bus = simulated_bus(
        &config,
        SimulationSettings {
            offline_ids: vec![3],
            ..SimulationSettings::default()
        },
    );
    let mut session = ServoSession::with_clock(config, Box::new(bus), ManualClock::new());
    session.connect().unwrap();
    assert!(session.ensure_extended_mode().unwrap_err().is_bus());
    assert!(session.execute_default().unwrap_err().is_bus());
}
