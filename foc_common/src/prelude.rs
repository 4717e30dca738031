//! Prelude module for common re-exports.
//!
//! ```rust
//! use foc_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, DriverConfig, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{CALIBRATION_BLOCK_SIZE, CALIBRATION_MAGIC, ENC_ANG_CORR_TABLE_SIZE};

// ─── Records ────────────────────────────────────────────────────────
pub use crate::records::{
    Calibration, ControlMode, CorrectionTable, EncoderMode, FaultFlags, Parameters, Results,
};

/// Default control cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(crate::consts::CYCLE_TIME_US);
