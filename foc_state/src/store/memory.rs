//! RAM-backed store with fault injection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use foc_common::consts::ERASED_BYTE;

use super::{NvStore, check_range};
use crate::error::{StoreError, StoreResult};

/// Fault switches of a [`MemoryStore`].
///
/// Cloneable so a test can keep a handle after the store has been moved
/// into a `CalibrationStore`.
#[derive(Debug, Clone, Default)]
pub struct StoreFaults {
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl StoreFaults {
    /// Make every subsequent read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn reads_fail(&self) -> bool {
        self.fail_reads.load(Ordering::Relaxed)
    }

    fn writes_fail(&self) -> bool {
        self.fail_writes.load(Ordering::Relaxed)
    }
}

/// In-memory store image.
///
/// Used by tests and the simulator. Read and write faults can be injected
/// to exercise the storage-fault paths.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    image: Vec<u8>,
    faults: StoreFaults,
    writes: u64,
}

impl MemoryStore {
    /// Erased store (every byte `0xFF`).
    pub fn new(capacity: usize) -> Self {
        Self::from_image(vec![ERASED_BYTE; capacity])
    }

    /// All-zero store.
    pub fn zeroed(capacity: usize) -> Self {
        Self::from_image(vec![0; capacity])
    }

    /// Store holding exactly `image`.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            image,
            faults: StoreFaults::default(),
            writes: 0,
        }
    }

    /// Raw store contents.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Mutable raw contents, for corrupting data in tests.
    pub fn image_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Handle on the fault switches.
    pub fn faults(&self) -> StoreFaults {
        self.faults.clone()
    }

    /// Make every subsequent read fail.
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.faults.set_fail_reads(fail);
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.faults.set_fail_writes(fail);
    }

    /// Number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl NvStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()> {
        check_range(offset, buf.len(), self.capacity())?;
        if self.faults.reads_fail() {
            return Err(StoreError::ReadFailed { offset });
        }
        buf.copy_from_slice(&self.image[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()> {
        check_range(offset, data.len(), self.capacity())?;
        if self.faults.writes_fail() {
            return Err(StoreError::WriteFailed { offset });
        }
        self.image[offset..offset + data.len()].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
