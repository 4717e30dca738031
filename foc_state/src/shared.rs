//! Shared control state and its split into per-context handles.
//!
//! [`SharedControlState`] owns one instance of every record plus the
//! recorder. It is built once before either context runs and consumed by
//! [`SharedControlState::split`], which hands every mailbox endpoint to
//! exactly one owner. After the split, the only cross-context paths are
//! the handoff slots and [`ControlStatus`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use foc_common::consts::DEFAULT_RECORDER_DECIMATION;
use foc_common::records::{Calibration, FaultFlags, Parameters, Results};
use static_assertions::assert_impl_all;
use tracing::debug;

use crate::comms::CommsContext;
use crate::control::ControlContext;
use crate::gate::GateDriver;
use crate::handoff::{snapshot_mailbox, staging_slot};
use crate::persistence::CalibrationStore;
use crate::recorder::SharedRecorder;

/// Status words published by the control loop.
///
/// Written with `Release`, read with `Acquire`. The re-arm sequence is the
/// one word written by the communications side.
#[derive(Debug, Default)]
pub struct ControlStatus {
    faults: AtomicU8,
    rearm_seq: AtomicU32,
    cycles: AtomicU64,
}

impl ControlStatus {
    /// Zeroed status.
    pub const fn new() -> Self {
        Self {
            faults: AtomicU8::new(0),
            rearm_seq: AtomicU32::new(0),
            cycles: AtomicU64::new(0),
        }
    }

    /// Control side: publish the state at the end of a cycle.
    #[inline]
    pub fn publish(&self, faults: FaultFlags, cycles: u64) {
        self.faults.store(faults.bits(), Ordering::Release);
        self.cycles.store(cycles, Ordering::Release);
    }

    /// Last published fault flags.
    #[inline]
    pub fn fault_flags(&self) -> FaultFlags {
        FaultFlags::from_bits_truncate(self.faults.load(Ordering::Acquire))
    }

    /// Completed control cycles.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Comms side: ask the control loop to clear latched faults.
    pub fn request_rearm(&self) -> u32 {
        self.rearm_seq.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Current re-arm sequence.
    #[inline]
    pub fn rearm_seq(&self) -> u32 {
        self.rearm_seq.load(Ordering::Acquire)
    }
}

/// Process-lifetime control state.
#[derive(Debug)]
pub struct SharedControlState {
    results: Results,
    calibration: Calibration,
    parameters: Parameters,
    recorder: Arc<SharedRecorder>,
    status: Arc<ControlStatus>,
}

impl SharedControlState {
    /// State with every record at its defaults and an idle recorder
    /// sampling every `recorder_decimation` cycles.
    pub fn new(recorder_decimation: u32) -> Self {
        let mut state = Self {
            results: Results::new(),
            calibration: Calibration::new(),
            parameters: Parameters::new(),
            recorder: Arc::new(SharedRecorder::new(recorder_decimation)),
            status: Arc::new(ControlStatus::new()),
        };
        state.initialize();
        state
    }

    /// Reset Results, Calibration and Parameters to their defaults.
    ///
    /// Infallible and idempotent.
    pub fn initialize(&mut self) {
        self.results = Results::default();
        self.calibration = Calibration::default();
        self.parameters = Parameters::default();
    }

    /// Current Results record.
    pub fn results(&self) -> &Results {
        &self.results
    }

    /// Current Calibration record.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Current Parameters record.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Shared recorder.
    pub fn recorder(&self) -> &SharedRecorder {
        &self.recorder
    }

    /// Hand the state to the two execution contexts.
    ///
    /// `nv` backs the communications side's persistence operations; `gate`
    /// is driven by the control loop.
    pub fn split<G>(self, nv: CalibrationStore, gate: G) -> (ControlContext, CommsContext)
    where
        G: GateDriver + Send + 'static,
    {
        let (results_tx, results_rx) = snapshot_mailbox(self.results);
        let (params_tx, params_rx) = snapshot_mailbox(self.parameters);
        let (cal_tx, cal_rx) = staging_slot(self.calibration);

        debug!("Shared control state split into control and comms contexts");

        let control = ControlContext::new(
            self.results,
            self.calibration,
            self.parameters,
            results_tx,
            params_rx,
            cal_rx,
            Box::new(gate),
            Arc::clone(&self.recorder),
            Arc::clone(&self.status),
        );
        let comms = CommsContext::new(
            self.calibration,
            self.parameters,
            params_tx,
            results_rx,
            cal_tx,
            nv,
            self.recorder,
            self.status,
        );
        (control, comms)
    }
}

assert_impl_all!(ControlContext: Send);
assert_impl_all!(CommsContext: Send);
assert_impl_all!(ControlStatus: Send, Sync);

impl Default for SharedControlState {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDER_DECIMATION)
    }
}
