//! System-wide constants for the FOC driver workspace.
//!
//! Single source of truth for the calibration marker, fixed table sizes and
//! the persisted block layout. Imported by all crates.

use static_assertions::const_assert_eq;

/// Start-sequence value marking a valid calibration record.
///
/// Any other value in `Calibration::start_sequence` means the record is
/// uninitialized or corrupted and must not be adopted.
pub const CALIBRATION_MAGIC: u16 = 0xC0DE;

/// Number of entries in the encoder angle correction table.
pub const ENC_ANG_CORR_TABLE_SIZE: usize = 257;

/// Size in bytes of the persisted calibration block.
///
/// Layout (little-endian, no padding):
/// `u16 start_sequence | u16 erev_start | u8 erevs_per_mrev | u8 flip_phases |
/// 16 x f32 gains/limits/motor | u16 control_timeout | 8 x f32 filters/offsets |
/// [i8; 257] correction table`.
pub const CALIBRATION_BLOCK_SIZE: usize = 2 + 2 + 1 + 1 + 16 * 4 + 2 + 8 * 4 + ENC_ANG_CORR_TABLE_SIZE;

const_assert_eq!(CALIBRATION_BLOCK_SIZE, 361);

/// Default control cycle time in microseconds (10 kHz).
pub const CYCLE_TIME_US: u64 = 100;

/// Default capacity of the non-volatile store in bytes.
pub const DEFAULT_STORE_CAPACITY: usize = 4096;

/// Default offset of the calibration block inside the store.
pub const DEFAULT_CALIBRATION_OFFSET: usize = 0;

/// Number of samples the recorder can hold.
pub const RECORDER_CAPACITY: usize = 512;

/// Default recorder decimation (one sample every N cycles).
pub const DEFAULT_RECORDER_DECIMATION: u32 = 10;

/// Byte value of an erased store cell.
pub const ERASED_BYTE: u8 = 0xFF;
