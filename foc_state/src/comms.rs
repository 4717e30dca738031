//! Communications context handle.
//!
//! Owns the live Parameters record, the working copy of Calibration and
//! the persistence store. Calibration changes made here reach the control
//! loop through a staging slot and are adopted at its next cycle boundary.

use std::sync::Arc;

use foc_common::records::{Calibration, FaultFlags, Parameters, Results};
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::handoff::{SnapshotConsumer, SnapshotProducer, StagingWriter};
use crate::persistence::{self, CalibrationStore, LoadOutcome};
use crate::recorder::SharedRecorder;
use crate::shared::ControlStatus;

/// State owned by the communications side.
pub struct CommsContext {
    parameters: Parameters,
    params_tx: SnapshotProducer<Parameters>,

    results_rx: SnapshotConsumer<Results>,

    calibration: Calibration,
    cal_tx: StagingWriter<Calibration>,
    cal_dirty: bool,
    nv: CalibrationStore,

    recorder: Arc<SharedRecorder>,
    status: Arc<ControlStatus>,
}

impl CommsContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        calibration: Calibration,
        parameters: Parameters,
        params_tx: SnapshotProducer<Parameters>,
        results_rx: SnapshotConsumer<Results>,
        cal_tx: StagingWriter<Calibration>,
        nv: CalibrationStore,
        recorder: Arc<SharedRecorder>,
        status: Arc<ControlStatus>,
    ) -> Self {
        Self {
            parameters,
            params_tx,
            results_rx,
            calibration,
            cal_tx,
            cal_dirty: false,
            nv,
            recorder,
            status,
        }
    }

    // ─── Parameters ─────────────────────────────────────────────────

    /// Live Parameters record.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Live Parameters record, for the message handler to update.
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// End of message processing.
    ///
    /// Hands a pending calibration change to the control loop and fulfills
    /// an outstanding Parameters request. Returns `true` if Parameters were
    /// copied.
    pub fn finish_message(&mut self) -> bool {
        self.flush_calibration();
        self.params_tx.try_fulfill(&self.parameters)
    }

    // ─── Results ────────────────────────────────────────────────────

    /// Ask the control loop for a Results snapshot.
    ///
    /// Returns `false` if a request is already outstanding.
    pub fn request_results(&mut self) -> bool {
        self.results_rx.request()
    }

    /// Take the requested Results snapshot once the control loop has
    /// committed it.
    pub fn poll_results(&mut self) -> Option<Results> {
        self.results_rx.try_consume()
    }

    /// Whether a Results request is still waiting on the control loop.
    pub fn results_outstanding(&self) -> bool {
        self.results_rx.is_outstanding()
    }

    // ─── Calibration ────────────────────────────────────────────────

    /// Working copy of Calibration.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Persist the working copy.
    pub fn store_calibration(&mut self) -> Result<(), PersistenceError> {
        self.nv.store(&self.calibration)
    }

    /// Reload the working copy from the store and push it to the control
    /// loop. A defaulted load pushes defaults. A read fault changes nothing.
    pub fn load_calibration(&mut self) -> Result<LoadOutcome, PersistenceError> {
        let outcome = self.nv.load(&mut self.calibration)?;
        self.mark_calibration_dirty();
        Ok(outcome)
    }

    /// Reset the working copy to defaults and push it to the control loop.
    /// The store is not touched.
    pub fn clear_calibration(&mut self) {
        persistence::clear(&mut self.calibration);
        info!("Calibration cleared to defaults");
        self.mark_calibration_dirty();
    }

    /// Erase the persisted calibration. The working copy is not touched.
    pub fn erase_calibration(&mut self) -> Result<(), PersistenceError> {
        self.nv.erase()
    }

    /// Replace the working copy wholesale and push it to the control loop.
    ///
    /// # Errors
    ///
    /// `PersistenceError::InvalidCalibration` if `cal` lacks the valid start
    /// sequence; nothing changes in that case.
    pub fn stage_calibration(&mut self, cal: Calibration) -> Result<(), PersistenceError> {
        if !cal.is_valid() {
            return Err(PersistenceError::InvalidCalibration {
                start_sequence: cal.start_sequence,
            });
        }
        self.calibration = cal;
        self.mark_calibration_dirty();
        Ok(())
    }

    /// Whether a calibration change has not been adopted by the control
    /// loop yet.
    pub fn calibration_pending(&self) -> bool {
        self.cal_dirty || self.cal_tx.is_waiting()
    }

    /// Offer a pending calibration change to the control loop.
    ///
    /// If the previous change is still waiting the offer is retried on the
    /// next call; only the latest working copy is ever delivered.
    pub fn flush_calibration(&mut self) {
        if self.cal_dirty && self.cal_tx.offer(&self.calibration) {
            self.cal_dirty = false;
            debug!("Calibration staged for the control loop");
        }
    }

    fn mark_calibration_dirty(&mut self) {
        self.cal_dirty = true;
        self.flush_calibration();
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Clear latched faults at the control loop's next cycle boundary.
    pub fn rearm(&self) {
        let seq = self.status.request_rearm();
        info!(seq, "Fault re-arm requested");
    }

    /// Fault flags last published by the control loop.
    pub fn fault_flags(&self) -> FaultFlags {
        self.status.fault_flags()
    }

    /// Cycles completed by the control loop.
    pub fn control_cycles(&self) -> u64 {
        self.status.cycles()
    }

    /// Shared recorder.
    pub fn recorder(&self) -> &SharedRecorder {
        &self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::NullGate;
    use crate::shared::SharedControlState;
    use crate::store::MemoryStore;

    fn comms() -> (crate::control::ControlContext, CommsContext) {
        let nv = CalibrationStore::new(MemoryStore::new(1024), 0).unwrap();
        SharedControlState::new(1).split(nv, NullGate)
    }

    #[test]
    fn stage_rejects_invalid() {
        let (_, mut comms) = comms();
        let bad = Calibration {
            start_sequence: 0,
            foc_kp_d: 9.0,
            ..Calibration::default()
        };
        assert!(comms.stage_calibration(bad).is_err());
        assert_eq!(*comms.calibration(), Calibration::default());
        assert!(!comms.calibration_pending());
    }

    #[test]
    fn latest_staged_calibration_wins() {
        let (mut control, mut comms) = comms();
        let first = Calibration {
            foc_kp_d: 1.0,
            ..Calibration::default()
        };
        let second = Calibration {
            foc_kp_d: 2.0,
            ..Calibration::default()
        };
        comms.stage_calibration(first).unwrap();
        comms.stage_calibration(second).unwrap();
        assert!(comms.calibration_pending());

        control.run_cycle(std::time::Instant::now(), |_, _, _| {});
        assert_eq!(control.calibration().foc_kp_d, 1.0);

        comms.finish_message();
        control.run_cycle(std::time::Instant::now(), |_, _, _| {});
        assert_eq!(control.calibration().foc_kp_d, 2.0);
        assert!(!comms.calibration_pending());
    }

    #[test]
    fn results_request_coalesces() {
        let (_, mut comms) = comms();
        assert!(comms.request_results());
        assert!(!comms.request_results());
        assert!(comms.results_outstanding());
        assert_eq!(comms.poll_results(), None);
    }
}
