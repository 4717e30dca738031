//! Control loop handle.
//!
//! One cycle is `begin_cycle` → external FOC math on the records →
//! `end_cycle`. Nothing here blocks, waits or allocates; every cross-context
//! exchange is a single flag check on a handoff slot.
//!
//! ## Cycle boundary order
//!
//! `begin_cycle`:
//! 1. Adopt a staged Calibration (only if its start sequence is valid).
//! 2. Take a Parameters snapshot if one was delivered; feed the watchdog.
//! 3. Honor a re-arm request (clears latched faults).
//! 4. Evaluate the watchdog; latch `TIMEOUT`.
//! 5. Latch `GATE_FAULT` from the gate driver.
//! 6. Enforce the gate interlock on the applied Parameters.
//! 7. Drive the gate on change.
//!
//! `end_cycle`:
//! 1. Sample the recorder.
//! 2. Fulfill an outstanding Results request.
//! 3. Ask for the next Parameters snapshot.
//! 4. Publish fault flags and the cycle count.

use std::sync::Arc;
use std::time::Instant;

use foc_common::records::{Calibration, FaultFlags, Parameters, Results};
use tracing::{error, info, warn};

use crate::gate::GateDriver;
use crate::handoff::{SnapshotConsumer, SnapshotProducer, StagingReader};
use crate::recorder::SharedRecorder;
use crate::shared::ControlStatus;
use crate::watchdog::{ParameterWatchdog, WatchdogEvent};

/// State owned by the control loop.
pub struct ControlContext {
    results: Results,
    calibration: Calibration,
    parameters: Parameters,

    results_tx: SnapshotProducer<Results>,
    params_rx: SnapshotConsumer<Parameters>,
    cal_rx: StagingReader<Calibration>,

    gate: Box<dyn GateDriver + Send>,
    gate_on: bool,
    watchdog: Option<ParameterWatchdog>,
    faults: FaultFlags,
    seen_rearm: u32,
    cycle: u64,

    recorder: Arc<SharedRecorder>,
    status: Arc<ControlStatus>,
}

impl ControlContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        results: Results,
        calibration: Calibration,
        parameters: Parameters,
        results_tx: SnapshotProducer<Results>,
        params_rx: SnapshotConsumer<Parameters>,
        cal_rx: StagingReader<Calibration>,
        gate: Box<dyn GateDriver + Send>,
        recorder: Arc<SharedRecorder>,
        status: Arc<ControlStatus>,
    ) -> Self {
        let seen_rearm = status.rearm_seq();
        Self {
            results,
            calibration,
            parameters,
            results_tx,
            params_rx,
            cal_rx,
            gate,
            gate_on: false,
            watchdog: None,
            faults: FaultFlags::empty(),
            seen_rearm,
            cycle: 0,
            recorder,
            status,
        }
    }

    /// Apply everything delivered since the previous cycle.
    pub fn begin_cycle(&mut self, now: Instant) {
        // 1. Calibration swap
        if let Some(cal) = self.cal_rx.take() {
            if cal.is_valid() {
                self.calibration = cal;
                info!(cycle = self.cycle, "Calibration swapped in");
            } else {
                warn!(
                    cycle = self.cycle,
                    "Rejected staged calibration with start sequence {:#06x}", cal.start_sequence
                );
            }
        }

        // 2. Parameters
        let watchdog = self.watchdog.get_or_insert_with(|| ParameterWatchdog::new(now));
        if let Some(params) = self.params_rx.try_consume() {
            self.parameters = params;
            watchdog.feed(now);
        }

        // 3. Re-arm
        let rearm = self.status.rearm_seq();
        if rearm != self.seen_rearm {
            self.seen_rearm = rearm;
            if self.faults.has_fault() {
                info!(cycle = self.cycle, "Faults re-armed: {:?}", self.faults);
            }
            self.faults.remove(FaultFlags::LATCHED_MASK);
            watchdog.rearm(now);
        }

        // 4. Watchdog
        if watchdog.check(now, self.calibration.control_timeout) == WatchdogEvent::Tripped {
            self.faults.insert(FaultFlags::TIMEOUT);
            warn!(
                cycle = self.cycle,
                "Parameter update timeout ({} ms), gates forced off",
                self.calibration.control_timeout
            );
        }

        // 5. Gate driver fault
        if self.gate.fault() && !self.faults.contains(FaultFlags::GATE_FAULT) {
            self.faults.insert(FaultFlags::GATE_FAULT);
            error!(cycle = self.cycle, "Gate driver fault, gates forced off");
        }

        // 6. Interlock
        self.parameters.timeout_flag = self.faults.contains(FaultFlags::TIMEOUT);
        self.parameters.gate_fault = self.faults.contains(FaultFlags::GATE_FAULT);
        if self.faults.has_fault() {
            self.parameters.gate_active = false;
        }
        debug_assert!(self.parameters.gate_interlock_ok());

        // 7. Gate output
        let want = self.parameters.gate_active;
        if want != self.gate_on {
            self.gate.set_active(want);
            self.gate_on = want;
        }
        self.faults.set(FaultFlags::GATE_ACTIVE, self.gate_on);
    }

    /// Publish the finished cycle.
    pub fn end_cycle(&mut self) {
        self.recorder.try_sample(self.cycle, &self.results);
        self.cycle += 1;

        self.results_tx.try_fulfill(&self.results);
        if !self.params_rx.is_pending() {
            self.params_rx.request();
        }

        self.status.publish(self.faults, self.cycle);
    }

    /// Run one full cycle with `step` as the cycle body.
    #[inline]
    pub fn run_cycle<F>(&mut self, now: Instant, step: F)
    where
        F: FnOnce(&Parameters, &Calibration, &mut Results),
    {
        self.begin_cycle(now);
        step(&self.parameters, &self.calibration, &mut self.results);
        self.end_cycle();
    }

    /// Live Results, written by the FOC math during the cycle.
    #[inline]
    pub fn results_mut(&mut self) -> &mut Results {
        &mut self.results
    }

    /// Live Results.
    #[inline]
    pub fn results(&self) -> &Results {
        &self.results
    }

    /// Parameters in effect for this cycle, interlock applied.
    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Calibration in effect.
    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Current fault flags.
    #[inline]
    pub fn fault_flags(&self) -> FaultFlags {
        self.faults
    }

    /// Whether the gate is driven active.
    #[inline]
    pub fn gate_active(&self) -> bool {
        self.gate_on
    }

    /// Completed cycles.
    #[inline]
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }
}
