//! Control loop behavior at cycle boundaries: defaults, watchdog, gate
//! interlock, calibration swap, recorder.

use std::time::{Duration, Instant};

use foc_state::prelude::*;

const CYCLE: Duration = Duration::from_micros(100);

struct Rig {
    control: ControlContext,
    comms: CommsContext,
    gate: SimGate,
    t0: Instant,
}

impl Rig {
    fn new(decimation: u32) -> Self {
        let gate = SimGate::new();
        let nv = CalibrationStore::new(MemoryStore::new(4096), 0).unwrap();
        let (control, comms) = SharedControlState::new(decimation).split(nv, gate.clone());
        Self {
            control,
            comms,
            gate,
            t0: Instant::now(),
        }
    }

    fn now(&self) -> Instant {
        self.t0 + CYCLE * self.control.cycle_count() as u32
    }

    fn cycle(&mut self) {
        let now = self.now();
        self.control.run_cycle(now, |_, _, _| {});
    }

    fn cycles(&mut self, n: usize) {
        for _ in 0..n {
            self.cycle();
        }
    }

    /// Comms sends one message every `every` cycles for `n` cycles.
    fn stream(&mut self, n: usize, every: usize) {
        for i in 0..n {
            if i % every == 0 {
                self.comms.finish_message();
            }
            self.cycle();
        }
    }
}

#[test]
fn test_defaults_after_initialization() {
    let rig = Rig::new(1);
    assert_eq!(*rig.control.results(), Results::default());
    assert_eq!(*rig.control.calibration(), Calibration::default());
    assert_eq!(*rig.control.parameters(), Parameters::default());
    assert_eq!(*rig.comms.calibration(), Calibration::default());
    assert_eq!(*rig.comms.parameters(), Parameters::default());
    assert!(rig.control.calibration().is_valid());
    assert!(rig.comms.fault_flags().is_empty());
    assert_eq!(rig.comms.control_cycles(), 0);
    assert!(!rig.gate.is_active());
}

#[test]
fn test_mid_cycle_results_request() {
    let mut rig = Rig::new(1);
    rig.cycle();

    rig.control.begin_cycle(rig.now());
    rig.control.results_mut().foc_d_current = 1.0;

    // Request lands while the cycle is half-written.
    assert!(rig.comms.request_results());
    assert_eq!(rig.comms.poll_results(), None);

    rig.control.results_mut().foc_q_current = 2.0;
    rig.control.results_mut().vin = 24.0;
    assert_eq!(rig.comms.poll_results(), None);
    rig.control.end_cycle();

    let snapshot = rig.comms.poll_results().unwrap();
    assert_eq!(snapshot.foc_d_current, 1.0);
    assert_eq!(snapshot.foc_q_current, 2.0);
    assert_eq!(snapshot.vin, 24.0);
    assert_eq!(rig.comms.poll_results(), None);
}

#[test]
fn test_results_not_copied_without_request() {
    let mut rig = Rig::new(1);
    rig.cycles(100);
    assert_eq!(rig.comms.poll_results(), None);
    assert_eq!(rig.comms.control_cycles(), 100);
}

#[test]
fn test_parameters_reach_control_only_at_message_boundary() {
    let mut rig = Rig::new(1);
    rig.cycle();

    rig.comms.parameters_mut().control_mode = ControlMode::Torque;
    rig.comms.parameters_mut().torque_sp = 0.8;
    rig.cycle();
    assert_eq!(rig.control.parameters().control_mode, ControlMode::FocCurrent);

    rig.comms.finish_message();
    rig.cycle();
    assert_eq!(rig.control.parameters().control_mode, ControlMode::Torque);
    assert_eq!(rig.control.parameters().torque_sp, 0.8);
}

#[test]
fn test_parameter_staleness_trips_watchdog() {
    let mut rig = Rig::new(1);
    rig.comms
        .stage_calibration(Calibration {
            control_timeout: 10,
            ..Calibration::default()
        })
        .unwrap();
    rig.comms.parameters_mut().gate_active = true;
    rig.comms.parameters_mut().foc_q_current_sp = 1.0;

    // 20 ms of messages every 1 ms: gate up, no fault.
    rig.stream(200, 10);
    assert_eq!(rig.control.calibration().control_timeout, 10);
    assert!(rig.control.gate_active());
    assert!(rig.gate.is_active());
    assert!(rig.comms.fault_flags().contains(FaultFlags::GATE_ACTIVE));
    assert!(!rig.comms.fault_flags().has_fault());

    // Comms goes silent for 15 ms.
    rig.cycles(150);
    assert!(rig.control.parameters().timeout_flag);
    assert!(!rig.control.parameters().gate_active);
    assert!(!rig.control.gate_active());
    assert!(!rig.gate.is_active());
    assert_eq!(rig.comms.fault_flags(), FaultFlags::TIMEOUT);
    assert!(rig.control.parameters().gate_interlock_ok());

    // Fresh messages alone do not clear the latch.
    rig.stream(50, 10);
    assert!(rig.comms.fault_flags().contains(FaultFlags::TIMEOUT));
    assert!(!rig.gate.is_active());

    // Explicit re-arm does.
    rig.comms.rearm();
    rig.stream(20, 10);
    assert!(!rig.comms.fault_flags().has_fault());
    assert!(!rig.control.parameters().timeout_flag);
    assert!(rig.gate.is_active());
}

#[test]
fn test_zero_timeout_disables_watchdog() {
    let mut rig = Rig::new(1);
    rig.comms.parameters_mut().gate_active = true;
    rig.stream(2, 1);
    assert!(rig.gate.is_active());
    rig.cycles(100_000);
    assert!(!rig.comms.fault_flags().has_fault());
    assert!(rig.gate.is_active());
}

#[test]
fn test_gate_fault_latches_until_rearm() {
    let mut rig = Rig::new(1);
    rig.comms.parameters_mut().gate_active = true;
    rig.stream(10, 1);
    assert!(rig.gate.is_active());

    rig.gate.inject_fault(true);
    rig.stream(2, 1);
    assert!(rig.control.parameters().gate_fault);
    assert!(!rig.control.parameters().gate_active);
    assert!(!rig.gate.is_active());
    assert!(rig.comms.fault_flags().contains(FaultFlags::GATE_FAULT));

    // Re-arm while the driver still reports a fault re-latches at once.
    rig.comms.rearm();
    rig.stream(2, 1);
    assert!(rig.comms.fault_flags().contains(FaultFlags::GATE_FAULT));
    assert!(!rig.gate.is_active());

    // Fault line clears; latch holds until re-armed.
    rig.gate.inject_fault(false);
    rig.stream(5, 1);
    assert!(rig.comms.fault_flags().contains(FaultFlags::GATE_FAULT));

    rig.comms.rearm();
    rig.stream(2, 1);
    assert_eq!(rig.comms.fault_flags(), FaultFlags::GATE_ACTIVE);
    assert!(rig.gate.is_active());
}

#[test]
fn test_calibration_swaps_at_cycle_boundary() {
    let mut rig = Rig::new(1);
    rig.cycle();

    let tuned = Calibration {
        foc_kp_q: 3.0,
        current_limit: 6.0,
        ..Calibration::default()
    };

    rig.control.begin_cycle(rig.now());
    rig.comms.stage_calibration(tuned).unwrap();
    // Mid-cycle: the control loop keeps the calibration it started with.
    assert_eq!(*rig.control.calibration(), Calibration::default());
    rig.control.end_cycle();
    assert_eq!(*rig.control.calibration(), Calibration::default());

    rig.cycle();
    assert_eq!(*rig.control.calibration(), tuned);
    assert!(!rig.comms.calibration_pending());
}

#[test]
fn test_invalid_calibration_never_reaches_control() {
    let mut rig = Rig::new(1);
    let corrupt = Calibration {
        start_sequence: 0xDEAD,
        foc_kp_d: 100.0,
        ..Calibration::default()
    };
    assert!(matches!(
        rig.comms.stage_calibration(corrupt),
        Err(PersistenceError::InvalidCalibration { start_sequence: 0xDEAD })
    ));
    assert!(rig.comms.store_calibration().is_ok());

    // Erased store: load falls back to defaults and pushes them.
    rig.comms.erase_calibration().unwrap();
    assert!(!rig.comms.load_calibration().unwrap().is_loaded());
    rig.cycles(3);
    assert!(rig.control.calibration().is_valid());
    assert_eq!(*rig.control.calibration(), Calibration::default());
}

#[test]
fn test_clear_calibration_reaches_control() {
    let mut rig = Rig::new(1);
    rig.comms
        .stage_calibration(Calibration {
            erevs_per_mrev: 7,
            ..Calibration::default()
        })
        .unwrap();
    rig.cycle();
    assert_eq!(rig.control.calibration().erevs_per_mrev, 7);

    rig.comms.clear_calibration();
    rig.cycle();
    assert_eq!(*rig.control.calibration(), Calibration::default());
}

#[test]
fn test_recorder_samples_decimated_cycles() {
    let mut rig = Rig::new(10);
    rig.comms.recorder().lock().start();

    for i in 0..35u32 {
        let now = rig.now();
        rig.control
            .run_cycle(now, |_, _, r| r.foc_q_current = i as f32);
    }

    let samples = rig.comms.recorder().lock().drain();
    let cycles: Vec<u64> = samples.iter().map(|s| s.cycle).collect();
    assert_eq!(cycles, vec![0, 10, 20, 30]);
    assert_eq!(samples[2].foc_q_current, 20.0);
    assert_eq!(rig.comms.recorder().contended(), 0);
}

#[test]
fn test_recorder_busy_drops_sample() {
    let mut rig = Rig::new(1);
    rig.comms.recorder().lock().start();
    {
        let _held = rig.comms.recorder().lock();
        let now = rig.now();
        rig.control.run_cycle(now, |_, _, _| {});
    }
    rig.cycle();
    assert_eq!(rig.comms.recorder().contended(), 1);
    let samples = rig.comms.recorder().lock().drain();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].cycle, 1);
}
