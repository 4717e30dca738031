//! Non-volatile store abstraction.
//!
//! The byte-level driver is an external collaborator; the core only needs
//! bounded `read` / `write` / `erase` on a fixed-capacity address space.
//! Implementations must make each `write` all-or-nothing.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, StoreFaults};

use foc_common::consts::ERASED_BYTE;

use crate::error::{StoreError, StoreResult};

/// Byte-addressable persistent memory.
pub trait NvStore {
    /// Size of the address space [bytes].
    fn capacity(&self) -> usize;

    /// Fill `buf` with the bytes at `offset`.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()>;

    /// Write `data` at `offset`. Either every byte is written or none is.
    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()>;

    /// Return `len` bytes at `offset` to the erased state.
    fn erase(&mut self, offset: usize, len: usize) -> StoreResult<()> {
        check_range(offset, len, self.capacity())?;
        self.write(offset, &vec![ERASED_BYTE; len])
    }
}

impl<S: NvStore + ?Sized> NvStore for Box<S> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()> {
        (**self).write(offset, data)
    }

    fn erase(&mut self, offset: usize, len: usize) -> StoreResult<()> {
        (**self).erase(offset, len)
    }
}

/// Reject accesses that do not fit inside `capacity`.
pub(crate) fn check_range(offset: usize, len: usize, capacity: usize) -> StoreResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StoreError::OutOfRange {
            offset,
            len,
            capacity,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_inside_capacity() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(8, 8, 16).is_ok());
        assert!(check_range(16, 0, 16).is_ok());
    }

    #[test]
    fn range_outside_capacity() {
        assert!(matches!(
            check_range(8, 9, 16),
            Err(StoreError::OutOfRange { offset: 8, len: 9, capacity: 16 })
        ));
        assert!(check_range(usize::MAX, 2, 16).is_err());
    }

    #[test]
    fn boxed_store_forwards() {
        let mut store: Box<dyn NvStore + Send> = Box::new(MemoryStore::new(32));
        store.write(4, &[1, 2, 3]).unwrap();
        let mut buf = [0u8; 3];
        store.read(4, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        store.erase(4, 3).unwrap();
        store.read(4, &mut buf).unwrap();
        assert_eq!(buf, [ERASED_BYTE; 3]);
    }
}
