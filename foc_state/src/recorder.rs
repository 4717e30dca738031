//! Single-shot telemetry recorder.
//!
//! The control loop pushes one decimated sample per N cycles while armed;
//! the communications side arms, disarms and drains. Storage is a
//! fixed-capacity `heapless::Vec`, so sampling never allocates.

use std::sync::atomic::{AtomicU64, Ordering};

use foc_common::consts::RECORDER_CAPACITY;
use foc_common::records::Results;
use heapless::Vec;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

/// One recorded control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecordedSample {
    /// Control cycle the sample was taken in.
    pub cycle: u64,
    /// Measured direct current [A].
    pub foc_d_current: f32,
    /// Measured quadrature current [A].
    pub foc_q_current: f32,
    /// Phase A duty.
    pub duty_a: f32,
    /// Phase B duty.
    pub duty_b: f32,
    /// Phase C duty.
    pub duty_c: f32,
    /// Rotor position [rad].
    pub rotor_pos: f32,
    /// High-bandwidth rotor velocity [rad/s].
    pub hf_rotor_vel: f32,
    /// Supply voltage [V].
    pub vin: f32,
}

impl RecordedSample {
    /// Sample `results` as seen at the end of `cycle`.
    pub const fn from_results(cycle: u64, results: &Results) -> Self {
        Self {
            cycle,
            foc_d_current: results.foc_d_current,
            foc_q_current: results.foc_q_current,
            duty_a: results.duty_a,
            duty_b: results.duty_b,
            duty_c: results.duty_c,
            rotor_pos: results.rotor_pos,
            hf_rotor_vel: results.hf_rotor_vel,
            vin: results.vin,
        }
    }
}

/// Sample buffer and capture state.
#[derive(Debug)]
pub struct Recorder {
    samples: Vec<RecordedSample, RECORDER_CAPACITY>,
    recording: bool,
    decimation: u32,
    countdown: u32,
}

impl Recorder {
    /// Idle recorder keeping one sample every `decimation` cycles.
    ///
    /// A decimation of zero is treated as one.
    pub fn new(decimation: u32) -> Self {
        let decimation = decimation.max(1);
        Self {
            samples: Vec::new(),
            recording: false,
            decimation,
            countdown: 0,
        }
    }

    /// Discard previous samples and arm the capture.
    pub fn start(&mut self) {
        self.samples.clear();
        self.countdown = 0;
        self.recording = true;
    }

    /// Disarm. Samples already taken are kept.
    pub fn stop(&mut self) {
        self.recording = false;
    }

    /// Whether the capture is armed.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Decimation factor.
    pub fn decimation(&self) -> u32 {
        self.decimation
    }

    /// Offer one cycle. Returns `true` if a sample was stored.
    ///
    /// Capture stops on its own once the buffer is full.
    pub fn sample(&mut self, cycle: u64, results: &Results) -> bool {
        if !self.recording {
            return false;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return false;
        }
        self.countdown = self.decimation - 1;

        let stored = self
            .samples
            .push(RecordedSample::from_results(cycle, results))
            .is_ok();
        if self.samples.is_full() {
            self.recording = false;
        }
        stored
    }

    /// Captured samples, oldest first.
    pub fn samples(&self) -> &[RecordedSample] {
        &self.samples
    }

    /// Take all captured samples out of the buffer.
    pub fn drain(&mut self) -> std::vec::Vec<RecordedSample> {
        let out = self.samples.to_vec();
        self.samples.clear();
        out
    }

    /// Number of captured samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample is captured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the buffer is full.
    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }
}

/// Recorder shared by both contexts.
///
/// The control loop only ever uses [`SharedRecorder::try_sample`], which
/// never waits: if the communications side holds the lock, the sample is
/// dropped and counted.
#[derive(Debug)]
pub struct SharedRecorder {
    recorder: Mutex<Recorder>,
    contended: AtomicU64,
}

impl SharedRecorder {
    /// Shared idle recorder.
    pub fn new(decimation: u32) -> Self {
        Self {
            recorder: Mutex::new(Recorder::new(decimation)),
            contended: AtomicU64::new(0),
        }
    }

    /// Control side: offer one cycle without blocking.
    #[inline]
    pub fn try_sample(&self, cycle: u64, results: &Results) -> bool {
        match self.recorder.try_lock() {
            Some(mut rec) => {
                let was_recording = rec.is_recording();
                let stored = rec.sample(cycle, results);
                if was_recording && !rec.is_recording() {
                    debug!("Recorder full after {} samples", rec.len());
                }
                stored
            }
            None => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Communications side: exclusive access.
    pub fn lock(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock()
    }

    /// Samples dropped because the recorder was busy.
    pub fn contended(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }
}
