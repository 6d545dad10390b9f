//! # EVO Servo Binary
//!
//! Operator CLI for a synchronized servo group.
//!
//! # Usage
//!
//! ```bash
//! # List responding axes
//! evo_servo --config config/servo.toml scan
//!
//! # Move every axis to 90 deg, axis 2 to 45 deg, over 2 s
//! evo_servo --config config/servo.toml move all=90 2=45 --duration 2
//!
//! # Nudge axis 1 by +5 deg from its present position, simulated
//! evo_servo --config config/servo.toml --simulate nudge 1=5
//!
//! # Snap the command to the nearest whole turn and return home
//! evo_servo --config config/servo.toml home --soft-reset to_nearest_turn
//! ```

#![deny(warnings)]

use clap::{Args as ClapArgs, Parser, Subcommand};
use evo_common::config::LogLevel;
use evo_common::consts::DEFAULT_CONFIG_PATH;
use evo_common::servo::config::ServoConfig;
use evo_common::servo::types::CurrentGuard;
use evo_hal::DriverRegistry;
use evo_hal::drivers::simulation;
use evo_servo::command::{DegreeMap, ResetMode};
use evo_servo::executor::{MotionOutcome, MotionProfile, MotionResult};
use evo_servo::session::ServoSession;
use evo_servo::shaper::Shaping;
use evo_servo::targets::parse_targets;
use evo_servo::ServoError;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Duration of the deliberate return-to-zero after an interrupt.
const RETURN_TO_ZERO_S: f64 = 3.0;

/// EVO Servo - time-synchronized multi-axis servo control
#[derive(Parser, Debug)]
#[command(name = "evo_servo")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Time-synchronized multi-axis servo control")]
#[command(long_about = None)]
struct Args {
    /// Path to servo configuration file (servo.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the bus and list responding axes
    Scan,
    /// Switch every configured axis to extended-position mode
    Mode,
    /// Snap the command state to the measured positions
    Reset {
        /// to_present | to_nearest_turn
        #[arg(long, default_value = "to_present")]
        mode: String,
    },
    /// Move to absolute targets (ID=DEG, all=DEG)
    Move {
        /// Target specs
        #[arg(required = true)]
        targets: Vec<String>,
        #[command(flatten)]
        motion: MotionArgs,
    },
    /// Nudge relative to the command state (ID=DEG, all=DEG)
    Nudge {
        /// Delta specs
        #[arg(required = true)]
        deltas: Vec<String>,
        #[command(flatten)]
        motion: MotionArgs,
    },
    /// Move every axis to 0 deg
    Home {
        #[command(flatten)]
        motion: MotionArgs,
    },
}

/// Per-motion overrides of the `[motion]` defaults.
#[derive(ClapArgs, Debug)]
struct MotionArgs {
    /// Streaming duration in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Waypoint rate in Hz
    #[arg(long)]
    poll_hz: Option<u32>,

    /// Settle tolerance in degrees
    #[arg(long)]
    eps_deg: Option<f64>,

    /// Consecutive in-tolerance polls required to settle
    #[arg(long)]
    settle: Option<u32>,

    /// Linear interpolation instead of smoothstep
    #[arg(long)]
    linear: bool,

    /// Lower current guard bound (requires --guard-max)
    #[arg(long, allow_negative_numbers = true)]
    guard_min: Option<i16>,

    /// Upper current guard bound (requires --guard-min)
    #[arg(long, allow_negative_numbers = true)]
    guard_max: Option<i16>,

    /// Skip switching axes to extended-position mode
    #[arg(long)]
    no_mode_set: bool,

    /// Reset the command state before moving (to_present | to_nearest_turn)
    #[arg(long)]
    soft_reset: Option<String>,
}

impl MotionArgs {
    /// Apply the overrides to the configured defaults.
    fn profile(&self, config: &ServoConfig) -> Result<MotionProfile, ServoError> {
        let mut profile = MotionProfile::from(&config.motion);
        if let Some(duration) = self.duration {
            profile.duration_s = duration;
        }
        if let Some(poll_hz) = self.poll_hz {
            profile.poll_hz = poll_hz;
        }
        if let Some(eps) = self.eps_deg {
            profile.epsilon_deg = eps;
        }
        if let Some(settle) = self.settle {
            profile.settle_streak = settle;
        }
        if self.linear {
            profile.shaping = Shaping::Linear;
        }
        match (self.guard_min, self.guard_max) {
            (Some(min), Some(max)) => profile.current_guard = Some(CurrentGuard::new(min, max)),
            (None, None) => {}
            _ => {
                return Err(ServoError::InvalidConfiguration(
                    "--guard-min and --guard-max must be given together".to_string(),
                ));
            }
        }
        profile.validate()?;
        Ok(profile)
    }

    fn reset_mode(&self) -> Result<Option<ResetMode>, ServoError> {
        self.soft_reset.as_deref().map(str::parse).transpose()
    }
}

/// Target mutation requested by a motion subcommand.
enum Targets {
    Absolute(DegreeMap),
    Relative(DegreeMap),
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!("evo_servo failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when a motion ended without settling.
fn run() -> Result<bool, ServoError> {
    let args = Args::parse();

    let loaded = ServoConfig::load_validated(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    let mut config = loaded.inspect_err(|e| {
        error!("Failed to load {}: {}", args.config.display(), e);
    })?;
    info!(
        "EVO Servo v{} starting ({}, {} axes)",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name,
        config.axes.ids.len()
    );

    if args.simulate {
        info!("Simulation mode enabled");
        config.bus.driver = simulation::DRIVER_NAME.to_string();
    }

    let registry = DriverRegistry::with_builtin_drivers();
    let mut session = ServoSession::from_registry(config, &registry)?;

    let stop = session.stop_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal");
        stop.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    session.connect()?;
    let outcome = dispatch(&mut session, args.command);
    if let Err(e) = session.close() {
        warn!("Failed to close bus: {}", e);
    }
    info!("EVO Servo shutdown complete");
    outcome
}

fn dispatch(session: &mut ServoSession, command: Command) -> Result<bool, ServoError> {
    let ids = session.config().axes.ids.clone();
    match command {
        Command::Scan => {
            let found = session.discover()?;
            let missing: Vec<_> = ids.iter().filter(|id| !found.contains(id)).collect();
            info!("Found {} axes: {:?}", found.len(), found);
            if !missing.is_empty() {
                warn!("Configured axes not responding: {:?}", missing);
            }
            println!("{}", to_json(&found)?);
            Ok(missing.is_empty())
        }
        Command::Mode => {
            session.ensure_extended_mode()?;
            Ok(true)
        }
        Command::Reset { mode } => {
            session.reset_to_measured(mode.parse()?)?;
            if let Some(measured) = session.last_measured() {
                info!("Measured positions: {:?}", measured.positions());
            }
            println!("{}", to_json(session.command().goals())?);
            Ok(true)
        }
        Command::Move { targets, motion } => {
            let targets = Targets::Absolute(parse_targets(&targets, &ids)?);
            run_motion(session, targets, &motion, None)
        }
        Command::Nudge { deltas, motion } => {
            let deltas = Targets::Relative(parse_targets(&deltas, &ids)?);
            run_motion(session, deltas, &motion, Some(ResetMode::ToPresent))
        }
        Command::Home { motion } => {
            let zero = ids.iter().map(|&id| (id, 0.0)).collect();
            run_motion(session, Targets::Absolute(zero), &motion, None)
        }
    }
}

/// Mode set, optional reset, target update, motion, and a return-to-zero
/// if the motion was interrupted.
fn run_motion(
    session: &mut ServoSession,
    targets: Targets,
    motion: &MotionArgs,
    default_reset: Option<ResetMode>,
) -> Result<bool, ServoError> {
    let profile = motion.profile(session.config())?;
    let reset = motion.reset_mode()?.or(default_reset);

    if !motion.no_mode_set {
        session.ensure_extended_mode()?;
    }
    if let Some(mode) = reset {
        session.reset_to_measured(mode)?;
    }
    match &targets {
        Targets::Absolute(t) => session.set_absolute(t)?,
        Targets::Relative(d) => session.set_relative(d)?,
    }

    let result = session.execute(&profile)?;
    print_result(&result)?;

    if result.outcome == MotionOutcome::Interrupted {
        return_to_zero(session, &profile)?;
    }
    Ok(result.settled)
}

/// Deliberate final command after an operator interrupt.
fn return_to_zero(session: &mut ServoSession, profile: &MotionProfile) -> Result<(), ServoError> {
    warn!("Motion interrupted, returning all axes to zero");
    session.clear_stop();
    let zero: DegreeMap = session.config().axes.ids.iter().map(|&id| (id, 0.0)).collect();
    session.set_absolute(&zero)?;
    let home = MotionProfile {
        duration_s: RETURN_TO_ZERO_S,
        current_guard: None,
        ..*profile
    };
    let result = session.execute(&home)?;
    print_result(&result)?;
    Ok(())
}

fn print_result(result: &MotionResult) -> Result<(), ServoError> {
    println!("{}", to_json(result)?);
    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ServoError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ServoError::InvalidConfiguration(format!("result serialization failed: {e}")))
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
///
/// `RUST_LOG` takes precedence over both.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        log_level
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
