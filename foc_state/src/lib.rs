//! # FOC State Backbone
//!
//! Shared state between the hard real-time FOC control loop and the
//! asynchronous communications context of a three-phase motor driver.
//!
//! ## Execution Contexts
//!
//! 1. **Control loop**: fixed period, never blocks. Writes Results, applies
//!    Parameters and Calibration at cycle boundaries.
//! 2. **Communications**: aperiodic. Writes Parameters, requests Results
//!    snapshots, runs calibration persistence.
//!
//! ## Handoff
//!
//! Records cross between the contexts only through single-slot handoff
//! primitives (see [`handoff`]) guarded by one atomic flag each. A Results
//! snapshot is always one complete record from one control cycle. The
//! control path has no locks and performs no heap allocation.
//!
//! ## Persistence
//!
//! Calibration is stored as one fixed-size block in an [`store::NvStore`]
//! and is only adopted when its start sequence matches.
//!
//! ```rust
//! use foc_state::prelude::*;
//! use std::time::Instant;
//!
//! let nv = CalibrationStore::new(MemoryStore::new(4096), 0).unwrap();
//! let (mut control, mut comms) = SharedControlState::new(10).split(nv, NullGate);
//!
//! comms.request_results();
//! control.run_cycle(Instant::now(), |_params, _cal, results| results.vin = 24.0);
//! assert_eq!(comms.poll_results().map(|r| r.vin), Some(24.0));
//! ```

pub mod comms;
pub mod control;
pub mod cycle;
pub mod error;
pub mod gate;
pub mod handoff;
pub mod persistence;
pub mod recorder;
pub mod shared;
pub mod store;
pub mod watchdog;

/// Common re-exports.
pub mod prelude {
    pub use foc_common::prelude::*;

    pub use crate::comms::CommsContext;
    pub use crate::control::ControlContext;
    pub use crate::cycle::{ControlLoopRunner, CycleError, CycleStats, RtSetupReport, rt_setup};
    pub use crate::error::{PersistenceError, StoreError};
    pub use crate::gate::{GateDriver, NullGate, SimGate};
    pub use crate::persistence::{CalibrationStore, DefaultReason, LoadOutcome};
    pub use crate::recorder::{RecordedSample, Recorder, SharedRecorder};
    pub use crate::shared::{ControlStatus, SharedControlState};
    pub use crate::store::{FileStore, MemoryStore, NvStore};
}
