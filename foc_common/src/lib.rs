//! FOC Common Library
//!
//! Shared records, constants and configuration loading for the FOC motor
//! driver state backbone. Both execution contexts (control loop and
//! communications) build on these types.
//!
//! # Module Structure
//!
//! - [`consts`] - Magic marker, table sizes and persisted block layout
//! - [`records`] - Results, Calibration and Parameters records plus status bitflags
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use foc_common::prelude::*;
//!
//! let cal = Calibration::default();
//! assert!(cal.is_valid());
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod records;
