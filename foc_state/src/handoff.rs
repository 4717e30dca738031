//! Lock-free single-slot handoff between the two execution contexts.
//!
//! Two primitives, both built on one slot guarded by one atomic flag:
//!
//! - **Snapshot mailbox** (pull): the consumer raises a request flag, the
//!   producer copies its whole live record into the slot at its next
//!   boundary and clears the flag. Used for Results (control → comms) and
//!   Parameters (comms → control).
//! - **Staging slot** (push): the writer deposits a record and raises a
//!   ready flag, the reader adopts it at its next boundary and clears the
//!   flag. Used to swap Calibration into the control loop between cycles.
//!
//! ## Ordering
//!
//! The flag is the only synchronization point. The side that may touch the
//! slot is decided by the flag value, and every hand-over is a `Release`
//! store observed by an `Acquire` load on the other side, so a consumer that
//! observes the flag clear sees every write the producer made to the slot.
//!
//! Each endpoint is a unique, non-`Clone` handle: one producer and one
//! consumer per slot. Neither side ever blocks.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared slot behind a handoff pair.
struct Slot<T> {
    value: UnsafeCell<T>,
    /// Snapshot mailbox: request outstanding. Staging slot: value ready.
    flag: AtomicBool,
    /// Number of copies written into the slot.
    copies: AtomicU64,
}

// SAFETY: access to `value` is partitioned by `flag`; exactly one endpoint
// owns the slot for each flag value and ownership moves with Release/Acquire.
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T: Copy> Slot<T> {
    fn new(initial: T) -> Arc<Self> {
        Arc::new(Self {
            value: UnsafeCell::new(initial),
            flag: AtomicBool::new(false),
            copies: AtomicU64::new(0),
        })
    }

    /// # Safety
    /// Caller must own the slot for the current flag value.
    #[inline]
    unsafe fn write(&self, value: &T) {
        unsafe { *self.value.get() = *value };
        self.copies.fetch_add(1, Ordering::Relaxed);
    }

    /// # Safety
    /// Caller must own the slot for the current flag value.
    #[inline]
    unsafe fn read(&self) -> T {
        unsafe { *self.value.get() }
    }
}

// ─── Snapshot mailbox (pull) ────────────────────────────────────────

/// Create a snapshot mailbox whose committed snapshot starts as `initial`.
pub fn snapshot_mailbox<T: Copy + Send>(initial: T) -> (SnapshotProducer<T>, SnapshotConsumer<T>) {
    let slot = Slot::new(initial);
    (
        SnapshotProducer { slot: slot.clone() },
        SnapshotConsumer {
            slot,
            pending: false,
        },
    )
}

/// Producer end of a snapshot mailbox.
///
/// Owned by the context that writes the live record.
pub struct SnapshotProducer<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Copy + Send> SnapshotProducer<T> {
    /// Honor an outstanding request, if any, by committing `live`.
    ///
    /// Call at a boundary where `live` is complete (end of a control cycle,
    /// end of processing a message). Returns `true` if a copy was made.
    /// Never blocks; costs one flag load when no request is outstanding.
    #[inline]
    pub fn try_fulfill(&mut self, live: &T) -> bool {
        if !self.slot.flag.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: flag is set, so the consumer does not touch the slot
        // until we clear it below.
        unsafe { self.slot.write(live) };
        self.slot.flag.store(false, Ordering::Release);
        true
    }

    /// Whether the consumer is waiting for a snapshot.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.slot.flag.load(Ordering::Acquire)
    }

    /// Total snapshots committed so far.
    pub fn copies(&self) -> u64 {
        self.slot.copies.load(Ordering::Relaxed)
    }
}

/// Consumer end of a snapshot mailbox.
pub struct SnapshotConsumer<T> {
    slot: Arc<Slot<T>>,
    /// A request was issued and its snapshot has not been taken yet.
    pending: bool,
}

impl<T: Copy + Send> SnapshotConsumer<T> {
    /// Ask the producer for a snapshot.
    ///
    /// Returns `false` if a request is already outstanding: requests
    /// coalesce, they never queue.
    #[inline]
    pub fn request(&mut self) -> bool {
        if self.slot.flag.load(Ordering::Acquire) {
            return false;
        }
        self.pending = true;
        self.slot.flag.store(true, Ordering::Release);
        true
    }

    /// Take the snapshot answering the last request, once committed.
    ///
    /// Returns `None` while the request is outstanding, or if no request was
    /// issued since the last successful take.
    #[inline]
    pub fn try_consume(&mut self) -> Option<T> {
        if !self.pending || self.slot.flag.load(Ordering::Acquire) {
            return None;
        }
        self.pending = false;
        // SAFETY: flag is clear, so the producer does not touch the slot
        // until our next request.
        Some(unsafe { self.slot.read() })
    }

    /// Whether a request is outstanding (not yet honored by the producer).
    #[inline]
    pub fn is_outstanding(&self) -> bool {
        self.pending && self.slot.flag.load(Ordering::Acquire)
    }

    /// Whether a request was issued and its snapshot is not taken yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Total snapshots committed so far.
    pub fn copies(&self) -> u64 {
        self.slot.copies.load(Ordering::Relaxed)
    }
}

// ─── Staging slot (push) ────────────────────────────────────────────

/// Create a staging slot.
pub fn staging_slot<T: Copy + Send>(initial: T) -> (StagingWriter<T>, StagingReader<T>) {
    let slot = Slot::new(initial);
    (StagingWriter { slot: slot.clone() }, StagingReader { slot })
}

/// Writer end of a staging slot.
pub struct StagingWriter<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Copy + Send> StagingWriter<T> {
    /// Deposit `value` for the reader.
    ///
    /// Returns `false` without writing if the previous value has not been
    /// adopted yet; the caller retries at its next boundary.
    #[inline]
    pub fn offer(&mut self, value: &T) -> bool {
        if self.slot.flag.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: flag is clear, so the reader does not touch the slot
        // until we set it below.
        unsafe { self.slot.write(value) };
        self.slot.flag.store(true, Ordering::Release);
        true
    }

    /// Whether a deposited value is waiting to be adopted.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.slot.flag.load(Ordering::Acquire)
    }
}

/// Reader end of a staging slot.
pub struct StagingReader<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Copy + Send> StagingReader<T> {
    /// Adopt a deposited value, if any.
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        if !self.slot.flag.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: flag is set, so the writer does not touch the slot until
        // we clear it below.
        let value = unsafe { self.slot.read() };
        self.slot.flag.store(false, Ordering::Release);
        Some(value)
    }
}
