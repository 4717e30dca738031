//! Error types for storage and calibration persistence.

use thiserror::Error;

/// Errors raised by a non-volatile store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Access outside the store.
    #[error("access out of range: {len} bytes at offset {offset} exceeds capacity {capacity}")]
    OutOfRange {
        /// Requested offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Store capacity.
        capacity: usize,
    },

    /// The device rejected a write.
    #[error("store write failed at offset {offset}")]
    WriteFailed {
        /// Offset of the rejected write.
        offset: usize,
    },

    /// The device rejected a read.
    #[error("store read failed at offset {offset}")]
    ReadFailed {
        /// Offset of the rejected read.
        offset: usize,
    },

    /// IO error from a file-backed store.
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Errors raised by calibration persistence operations.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying store failed; the operation had no effect.
    #[error("storage fault: {0}")]
    Storage(#[from] StoreError),

    /// Refused to persist or stage a record without the valid start sequence.
    #[error("invalid calibration: start sequence {start_sequence:#06x}")]
    InvalidCalibration {
        /// Offending start sequence.
        start_sequence: u16,
    },

    /// Serialization of the calibration block failed.
    #[error("calibration encoding failed: {0}")]
    Encode(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
