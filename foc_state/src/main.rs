//! # FOC Driver Simulator
//!
//! Runs the state backbone end to end on a host: a paced control thread
//! driving a simulated motor, and a communications loop in the main thread
//! that streams setpoints, polls Results snapshots and manages calibration
//! in a file-backed store.

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use foc_common::config::{ConfigError, ConfigLoader, ControlConfig, DriverConfig, LogLevel};
use foc_common::records::{Calibration, ControlMode, EncoderMode, Parameters, Results};
use foc_state::control::ControlContext;
use foc_state::cycle::{ControlLoopRunner, CycleError, CycleStats, rt_setup};
use foc_state::gate::SimGate;
use foc_state::persistence::{CalibrationStore, LoadOutcome};
use foc_state::shared::SharedControlState;
use foc_state::store::FileStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// FOC driver simulator
#[derive(Parser, Debug)]
#[command(name = "foc_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Simulated FOC control loop and communications context")]
struct Args {
    /// Path to driver configuration TOML.
    #[arg(default_value = "config/driver.toml")]
    config: PathBuf,

    /// Stop after this many seconds (runs until Ctrl-C if omitted).
    #[arg(long, value_name = "SECONDS")]
    duration_s: Option<u64>,

    /// Communications message period in milliseconds.
    #[arg(long, default_value_t = 10)]
    message_period_ms: u64,

    /// Stop sending setpoints after this many seconds to exercise the
    /// parameter watchdog.
    #[arg(long, value_name = "SECONDS")]
    go_silent_after_s: Option<u64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let (config, from_file) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("FATAL: cannot load {:?}: {e}", args.config);
            process::exit(1);
        }
    };
    setup_tracing(&args, config.shared.log_level);

    info!("FOC simulator v{} starting...", env!("CARGO_PKG_VERSION"));
    if !from_file {
        warn!("Config {:?} not found, using defaults", args.config);
    }

    if let Err(e) = run(&args, &config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("FOC simulator shutdown complete");
}

fn run(args: &Args, config: &DriverConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    info!(
        "Config OK: service={}, cycle_time={}µs, store={:?}",
        config.shared.service_name, config.control.cycle_time_us, config.storage.path
    );

    // ── Shared state ──
    let store = FileStore::new(&config.storage.path, config.storage.capacity);
    let nv = CalibrationStore::new(store, config.storage.calibration_offset)?;
    let gate = SimGate::new();
    let (control, mut comms) =
        SharedControlState::new(config.recorder.decimation).split(nv, gate.clone());

    // ── Boot calibration ──
    match comms.load_calibration()? {
        LoadOutcome::Loaded => info!("Calibration loaded from store"),
        LoadOutcome::Defaulted(reason) => {
            warn!("Booting with default calibration ({reason:?})");
            let cal = Calibration {
                control_timeout: 100,
                motor_torque_const: 0.05,
                ..Calibration::default()
            };
            comms.stage_calibration(cal)?;
            comms.store_calibration()?;
            info!("Stored simulator calibration for the next boot");
        }
    }

    // ── Shutdown ──
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    // ── Control thread ──
    let control_cfg = config.control.clone();
    let control_running = running.clone();
    let control_thread = thread::Builder::new()
        .name("foc-control".into())
        .spawn(move || {
            let flag = control_running.clone();
            stop_on_exit(&control_running, || run_control(control, &control_cfg, flag))
        })?;

    // ── Communications loop ──
    comms.recorder().lock().start();
    let started = Instant::now();
    let message_period = Duration::from_millis(args.message_period_ms);
    let mut last_report = started;
    let mut last_faults = comms.fault_flags();

    while running.load(Ordering::SeqCst) {
        let elapsed = started.elapsed();
        if args.duration_s.is_some_and(|d| elapsed >= Duration::from_secs(d)) {
            break;
        }

        let silent = args
            .go_silent_after_s
            .is_some_and(|s| elapsed >= Duration::from_secs(s));
        if !silent {
            let params = comms.parameters_mut();
            params.control_mode = ControlMode::FocCurrent;
            params.gate_active = true;
            params.foc_q_current_sp = 0.5 * (elapsed.as_secs_f32() * 0.5 * TAU).sin();
            comms.finish_message();
        }

        let faults = comms.fault_flags();
        if faults != last_faults {
            info!("Fault flags changed: {:?} -> {:?}", last_faults, faults);
            last_faults = faults;
        }

        if let Some(r) = comms.poll_results() {
            info!(
                cycles = comms.control_cycles(),
                iq = r.foc_q_current,
                vel = r.hf_rotor_vel,
                pos = r.rotor_pos,
                gate = gate.is_active(),
                "Results snapshot"
            );
        }
        if last_report.elapsed() >= Duration::from_secs(1) && comms.request_results() {
            last_report = Instant::now();
        }

        thread::sleep(message_period);
    }

    if control_thread.is_finished() {
        warn!("Control loop stopped on its own, leaving the communications loop");
    }
    running.store(false, Ordering::SeqCst);
    let stats = match control_thread.join() {
        Ok(result) => result?,
        Err(_) => return Err("control thread panicked".into()),
    };
    info!(
        "Control loop: {} cycles, avg {} ns, max {} ns, {} overruns",
        stats.cycle_count,
        stats.avg_cycle_ns(),
        stats.max_cycle_ns,
        stats.overruns
    );

    let samples = comms.recorder().lock().drain();
    info!(
        "Recorder captured {} samples ({} dropped on contention)",
        samples.len(),
        comms.recorder().contended()
    );

    Ok(())
}

/// Run the control thread body and clear `running` however it ends, so the
/// communications loop never keeps feeding a dead control loop.
fn stop_on_exit<T, E: std::fmt::Display>(
    running: &AtomicBool,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let result = body();
    running.store(false, Ordering::SeqCst);
    if let Err(e) = &result {
        error!("Control loop failed: {e}");
    }
    result
}

/// RT setup, then the paced control loop until it stops or fails.
fn run_control(
    control: ControlContext,
    cfg: &ControlConfig,
    running: Arc<AtomicBool>,
) -> Result<CycleStats, CycleError> {
    let rt = rt_setup(cfg.rt_cpu_core, cfg.rt_priority)?;
    if rt.is_realtime() {
        info!(core = ?rt.cpu_core, priority = ?rt.fifo_priority, "Control thread is real-time");
    } else {
        info!("Control thread runs without RT scheduling");
    }

    let dt = cfg.cycle_time_us as f32 * 1e-6;
    let mut plant = SimMotor::default();
    let mut runner = ControlLoopRunner::new(
        control,
        move |p: &Parameters, c: &Calibration, r: &mut Results| plant.step(p, c, r, dt),
        cfg.cycle_time_us,
        running,
    );
    runner.run()?;
    let (_, stats) = runner.into_inner();
    Ok(stats)
}

/// Load the configuration. A missing file yields defaults and `false`.
fn load_config(path: &Path) -> Result<(DriverConfig, bool), ConfigError> {
    match DriverConfig::load(path) {
        Ok(config) => Ok((config, true)),
        Err(ConfigError::FileNotFound) => Ok((DriverConfig::with_service_name("foc-sim"), false)),
        Err(e) => Err(e),
    }
}

/// Single-inertia motor model standing in for the FOC math and hardware.
#[derive(Debug, Default)]
struct SimMotor {
    pos: f32,
    vel: f32,
    lf_vel: f32,
    revs: i16,
}

impl SimMotor {
    const INERTIA: f32 = 1e-4;
    const DAMPING: f32 = 1e-3;
    const VIN: f32 = 24.0;

    fn step(&mut self, p: &Parameters, c: &Calibration, r: &mut Results, dt: f32) {
        let iq = if p.gate_active {
            limit(p.foc_q_current_sp, c.current_limit)
        } else {
            0.0
        };
        let torque = iq * c.motor_torque_const;
        self.vel += (torque - Self::DAMPING * self.vel) / Self::INERTIA * dt;
        self.vel = limit(self.vel, c.velocity_limit);
        self.lf_vel += c.lf_velocity_filter_param * (self.vel - self.lf_vel);

        self.pos += self.vel * dt;
        if self.pos >= TAU {
            self.pos -= TAU;
            self.revs = self.revs.wrapping_add(1);
        } else if self.pos < 0.0 {
            self.pos += TAU;
            self.revs = self.revs.wrapping_sub(1);
        }

        let vq = iq * c.motor_resistance;
        let duty = (vq / Self::VIN).clamp(-0.5, 0.5);
        *r = Results {
            foc_q_current: iq,
            foc_q_voltage: vq,
            iq_output: iq,
            duty_a: 0.5 + duty * self.pos.cos(),
            duty_b: 0.5 + duty * (self.pos - TAU / 3.0).cos(),
            duty_c: 0.5 + duty * (self.pos + TAU / 3.0).cos(),
            encoder_mode: EncoderMode::As5047d,
            raw_enc_value: (self.pos / TAU * 16384.0) as u16,
            enc_pos: self.pos,
            rotor_revs: self.revs,
            rotor_pos: self.pos,
            hf_rotor_vel: self.vel,
            lf_rotor_vel: self.lf_vel,
            vin: Self::VIN,
            temperature: 25.0,
            ..Results::default()
        };
    }
}

/// Symmetric limit that tolerates a negative or NaN bound from calibration.
fn limit(value: f32, bound: f32) -> f32 {
    let bound = bound.abs();
    value.max(-bound).min(bound)
}

/// Base log filter: `--verbose` raises the configured level to at least
/// DEBUG.
fn base_directive(verbose: bool, configured: LogLevel) -> &'static str {
    match configured {
        LogLevel::Trace => "trace",
        _ if verbose => "debug",
        level => level.as_directive(),
    }
}

/// Install the subscriber. `RUST_LOG` overrides the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(base_directive(args.verbose, configured)));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true);

    if args.json {
        fmt.json().init();
    } else {
        fmt.compact().init();
    }
}
