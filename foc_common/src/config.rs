//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load the driver's TOML
//! configuration file.
//!
//! # Usage
//!
//! ```rust,no_run
//! use foc_common::config::{ConfigLoader, DriverConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = DriverConfig::load(Path::new("config/driver.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::{
    CALIBRATION_BLOCK_SIZE, CYCLE_TIME_US, DEFAULT_CALIBRATION_OFFSET,
    DEFAULT_RECORDER_DECIMATION, DEFAULT_STORE_CAPACITY,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "foc-driver-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Control loop timing and RT placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Control period [µs].
    pub cycle_time_us: u64,
    /// CPU core the control thread is pinned to (`rt` feature only).
    pub rt_cpu_core: usize,
    /// SCHED_FIFO priority of the control thread (`rt` feature only).
    pub rt_priority: i32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            rt_cpu_core: 1,
            rt_priority: 80,
        }
    }
}

/// Non-volatile store backing file and calibration placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the file emulating the non-volatile store.
    pub path: PathBuf,
    /// Store capacity [bytes].
    pub capacity: usize,
    /// Offset of the calibration block [bytes].
    pub calibration_offset: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("nvm.bin"),
            capacity: DEFAULT_STORE_CAPACITY,
            calibration_offset: DEFAULT_CALIBRATION_OFFSET,
        }
    }
}

/// Diagnostic recorder sampling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    /// Record one sample every `decimation` control cycles.
    pub decimation: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            decimation: DEFAULT_RECORDER_DECIMATION,
        }
    }
}

/// Complete driver configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "foc-driver-sim"
///
/// [control]
/// cycle_time_us = 100
///
/// [storage]
/// path = "/var/lib/foc/nvm.bin"
/// capacity = 4096
/// calibration_offset = 0
///
/// [recorder]
/// decimation = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Common fields.
    pub shared: SharedConfig,
    /// Control loop timing.
    #[serde(default)]
    pub control: ControlConfig,
    /// Non-volatile store.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Recorder sampling.
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl DriverConfig {
    /// Configuration with defaults everywhere and the given service name.
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: name.into(),
            },
            control: ControlConfig::default(),
            storage: StorageConfig::default(),
            recorder: RecorderConfig::default(),
        }
    }

    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared.service_name` is empty
    /// - `control.cycle_time_us` is zero
    /// - the calibration block does not fit inside `storage.capacity`
    /// - `recorder.decimation` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.control.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "control.cycle_time_us must be > 0".to_string(),
            ));
        }

        let end = self
            .storage
            .calibration_offset
            .checked_add(CALIBRATION_BLOCK_SIZE);
        if end.is_none_or(|end| end > self.storage.capacity) {
            return Err(ConfigError::ValidationError(format!(
                "calibration block ({} bytes at offset {}) exceeds store capacity {}",
                CALIBRATION_BLOCK_SIZE, self.storage.calibration_offset, self.storage.capacity
            )));
        }

        if self.recorder.decimation == 0 {
            return Err(ConfigError::ValidationError(
                "recorder.decimation must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Default implementation for any type implementing
/// `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation: any serde-deserializable struct can be loaded.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
