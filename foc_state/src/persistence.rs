//! Calibration persistence.
//!
//! Serializes [`Calibration`] as one fixed-size little-endian block at a fixed
//! store offset. The block starts with the 16-bit start sequence; loading
//! checks it before anything else: a block carrying [`CALIBRATION_MAGIC`] is
//! adopted, anything else falls back to defaults. Every field decodes from
//! any byte pattern, so the marker is the only validity check.
//!
//! Encoding uses bincode's fixed-int little-endian legacy format, so every
//! field occupies its natural width and the block is always
//! [`CALIBRATION_BLOCK_SIZE`] bytes.

use foc_common::consts::{CALIBRATION_BLOCK_SIZE, CALIBRATION_MAGIC};
use foc_common::records::Calibration;
use tracing::{debug, info, warn};

use crate::error::{PersistenceError, StoreError};
use crate::store::NvStore;

/// Why `load` fell back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultReason {
    /// Start sequence did not match.
    MagicMismatch {
        /// Start sequence found in the store.
        found: u16,
    },
    /// Start sequence matched but bincode rejected the block. Only possible
    /// if the record layout and [`CALIBRATION_BLOCK_SIZE`] disagree.
    Malformed,
}

/// Result of a successful `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The persisted block was adopted.
    Loaded,
    /// No valid calibration was found; defaults were applied.
    Defaulted(DefaultReason),
}

impl LoadOutcome {
    /// Whether a persisted calibration was adopted.
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// Encode `cal` into its persisted block.
pub fn encode(cal: &Calibration) -> Result<[u8; CALIBRATION_BLOCK_SIZE], PersistenceError> {
    let bytes = bincode::serialize(cal).map_err(|e| PersistenceError::Encode(e.to_string()))?;
    <[u8; CALIBRATION_BLOCK_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        PersistenceError::Encode(format!(
            "encoded block is {} bytes, expected {CALIBRATION_BLOCK_SIZE}",
            bytes.len()
        ))
    })
}

/// Decode a persisted block.
///
/// The start sequence is checked first. Past the marker every byte pattern
/// decodes: floats take any bit pattern and the flag byte reads nonzero as
/// set.
pub fn decode(block: &[u8; CALIBRATION_BLOCK_SIZE]) -> Result<Calibration, DefaultReason> {
    let found = u16::from_le_bytes([block[0], block[1]]);
    if found != CALIBRATION_MAGIC {
        return Err(DefaultReason::MagicMismatch { found });
    }
    bincode::deserialize(block).map_err(|_| DefaultReason::Malformed)
}

/// Reset `cal` to defaults. Memory only; the store is not touched.
pub fn clear(cal: &mut Calibration) {
    *cal = Calibration::default();
}

/// Calibration block bound to a store region.
pub struct CalibrationStore {
    store: Box<dyn NvStore + Send>,
    offset: usize,
}

impl CalibrationStore {
    /// Bind the calibration block at `offset` inside `store`.
    ///
    /// # Errors
    ///
    /// `StoreError::OutOfRange` if the block does not fit.
    pub fn new<S: NvStore + Send + 'static>(store: S, offset: usize) -> Result<Self, StoreError> {
        crate::store::check_range(offset, CALIBRATION_BLOCK_SIZE, store.capacity())?;
        Ok(Self {
            store: Box::new(store),
            offset,
        })
    }

    /// Offset of the block in the store.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Persist `cal`.
    ///
    /// Refuses records without the valid start sequence, so an invalid
    /// record can never be made durable. On a write fault the store is left
    /// as it was.
    pub fn store(&mut self, cal: &Calibration) -> Result<(), PersistenceError> {
        if !cal.is_valid() {
            return Err(PersistenceError::InvalidCalibration {
                start_sequence: cal.start_sequence,
            });
        }
        let block = encode(cal)?;
        self.store.write(self.offset, &block)?;
        info!("Stored calibration block ({CALIBRATION_BLOCK_SIZE} bytes at offset {})", self.offset);
        Ok(())
    }

    /// Load the persisted block into `cal`.
    ///
    /// On a valid block `cal` is replaced wholesale. Otherwise `cal` is
    /// reset to defaults and the reason is reported. A read fault leaves
    /// `cal` untouched.
    pub fn load(&mut self, cal: &mut Calibration) -> Result<LoadOutcome, PersistenceError> {
        let mut block = [0u8; CALIBRATION_BLOCK_SIZE];
        self.store.read(self.offset, &mut block)?;

        match decode(&block) {
            Ok(loaded) => {
                *cal = loaded;
                debug!("Loaded calibration from offset {}", self.offset);
                Ok(LoadOutcome::Loaded)
            }
            Err(reason) => {
                clear(cal);
                match reason {
                    DefaultReason::MagicMismatch { found } => warn!(
                        "No valid calibration (start sequence {found:#06x}), using defaults"
                    ),
                    DefaultReason::Malformed => {
                        warn!("Calibration block malformed, using defaults")
                    }
                }
                Ok(LoadOutcome::Defaulted(reason))
            }
        }
    }

    /// Erase the persisted block so the next `load` falls back to defaults.
    pub fn erase(&mut self) -> Result<(), PersistenceError> {
        self.store.erase(self.offset, CALIBRATION_BLOCK_SIZE)?;
        info!("Erased calibration block at offset {}", self.offset);
        Ok(())
    }
}

impl std::fmt::Debug for CalibrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationStore")
            .field("offset", &self.offset)
            .field("capacity", &self.store.capacity())
            .finish()
    }
}
