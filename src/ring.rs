//! Core lock-free SPSC byte ring algorithm.
//!
//! This module provides the ring buffer data structure wrapped by the safe
//! handle layer in [`crate::channel`].
//!
//! # Safety
//!
//! The mutating APIs here are unsafe because they require the caller to
//! uphold the SPSC invariant: exactly one producer and one consumer, with no
//! concurrent access to either role.

use std::cell::UnsafeCell;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Errors returned by ring operations.
///
/// Both conditions are transient, never fatal: the caller may retry once the
/// other side has made progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The write would exceed currently free space. Nothing was written.
    #[error("insufficient space in ring buffer")]
    InsufficientSpace,

    /// No unread bytes are available, or a consume overran them.
    #[error("insufficient data in ring buffer")]
    InsufficientData,
}

/// Producer-side state: the write cursor, isolated on its own cache line.
#[repr(C)]
#[repr(align(64))]
struct ProducerState {
    /// Total bytes ever written (cursor of the next byte to write).
    /// Stored by the producer only, loaded by both sides.
    cursor: AtomicU64,
}

/// Consumer-side state: the read cursor, isolated on its own cache line.
#[repr(C)]
#[repr(align(64))]
struct ConsumerState {
    /// Total bytes ever consumed (cursor of the next byte to read).
    /// Stored by the consumer only, loaded by both sides.
    cursor: AtomicU64,
}

/// Lock-free single-producer single-consumer byte ring buffer.
///
/// Bytes live in a power-of-two storage array indexed by masking two
/// monotonically increasing 64-bit cursors; `write_cursor - read_cursor`
/// (the occupancy) always lies in `[0, capacity]`. The cursors never wrap:
/// at 10 GB/s a 64-bit byte counter lasts decades, so the arithmetic below
/// is plain, not wrapping.
///
/// This is the unsafe core. [`crate::channel`] wraps it in safe handles
/// that enforce the single-producer/single-consumer contract through
/// ownership; use those unless you are building your own wrapper.
#[repr(C)]
pub struct Ring {
    producer: ProducerState,
    consumer: ConsumerState,

    /// Prevent false sharing between consumer state and the fields below.
    _padding: [u8; 64],

    /// Capacity minus one. Capacity is always a power of two, so masking a
    /// cursor
    /// with this yields its storage index.
    mask: u64,

    /// Byte storage. Any given cell is mutated only by the producer and
    /// only while outside the unread region, per the SPSC protocol.
    storage: Box<[UnsafeCell<u8>]>,
}

impl Ring {
    /// Creates a ring with capacity rounded up to the next power of two.
    ///
    /// A request of 0 yields capacity 1. Storage is zero-initialized and
    /// both cursors start at 0. Construction is infallible; requests above
    /// `2^63` are the caller's responsibility to avoid.
    #[must_use]
    pub fn new(requested_capacity: usize) -> Self {
        let capacity = requested_capacity.next_power_of_two();
        let storage: Box<[UnsafeCell<u8>]> =
            (0..capacity).map(|_| UnsafeCell::new(0)).collect();

        Self {
            producer: ProducerState {
                cursor: AtomicU64::new(0),
            },
            consumer: ConsumerState {
                cursor: AtomicU64::new(0),
            },
            _padding: [0u8; 64],
            mask: capacity as u64 - 1,
            storage,
        }
    }

    /// Total capacity in bytes (always a power of two).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes currently free for writing.
    ///
    /// Callable from either side at any time; the result was accurate at
    /// some instant during the call, with no ordering relative to concurrent
    /// writes or reads.
    #[inline]
    #[must_use]
    pub fn available_write(&self) -> usize {
        let write_cursor = self.producer.cursor.load(Ordering::Acquire);
        let read_cursor = self.consumer.cursor.load(Ordering::Acquire);
        self.capacity() - (write_cursor - read_cursor) as usize
    }

    /// Bytes currently waiting to be read.
    ///
    /// Snapshot semantics as [`Ring::available_write`].
    #[inline]
    #[must_use]
    pub fn available_read(&self) -> usize {
        let write_cursor = self.producer.cursor.load(Ordering::Acquire);
        let read_cursor = self.consumer.cursor.load(Ordering::Acquire);
        (write_cursor - read_cursor) as usize
    }

    /// Raw pointer to the storage byte at `index`.
    #[inline]
    fn storage_ptr(&self, index: usize) -> *mut u8 {
        self.storage[index].get()
    }

    /// Writes all of `data` into the ring, or nothing.
    ///
    /// Returns `data.len()` on success. Unlike generic writers there is no
    /// partial write: if free space is smaller than `data.len()`, the ring
    /// is left untouched and [`RingError::InsufficientSpace`] is returned.
    /// `write(&[])` is a no-op returning 0.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread at a time calls producer-side
    /// methods (`write`).
    #[inline]
    pub unsafe fn write(&self, data: &[u8]) -> Result<usize, RingError> {
        if data.is_empty() {
            return Ok(0);
        }
        let len = data.len() as u64;

        // Own cursor: the producer is its only writer, so a relaxed load
        // always sees the latest value.
        let write_cursor = self.producer.cursor.load(Ordering::Relaxed);

        // Fresh read cursor: acquire pairs with the consumer's release
        // publish, ordering our reuse of consumed storage after the
        // consumer's reads of it.
        let read_cursor = self.consumer.cursor.load(Ordering::Acquire);

        let occupancy = write_cursor - read_cursor;
        debug_assert!(occupancy <= self.capacity() as u64);

        if len > self.capacity() as u64 - occupancy {
            return Err(RingError::InsufficientSpace);
        }

        let start = (write_cursor & self.mask) as usize;
        let first = data.len().min(self.capacity() - start);

        // SAFETY: The space check puts [write_cursor, write_cursor + len)
        // entirely in the free region, which the consumer does not touch
        // until the publish below moves it into the unread region. Bounds:
        // start + first <= capacity and len - first <= start, so both copies
        // stay inside storage. `data` can alias storage only through peeked
        // views of the unread region, which is disjoint from the free region
        // we copy into.
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.storage_ptr(start), first);
            if first < data.len() {
                ptr::copy_nonoverlapping(
                    data.as_ptr().add(first),
                    self.storage_ptr(0),
                    data.len() - first,
                );
            }
        }

        // Publish: release orders the byte copies before the new cursor, so
        // a consumer that observes the cursor also observes the bytes.
        self.producer
            .cursor
            .store(write_cursor + len, Ordering::Release);

        Ok(data.len())
    }

    /// Reads up to `dst.len()` bytes into `dst`.
    ///
    /// Reads as many bytes as are available, up to `dst.len()`, and returns
    /// the count; a short read is success, not an error. An empty ring
    /// fails with [`RingError::InsufficientData`]. `read` into an empty
    /// slice is a no-op returning 0.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread at a time calls consumer-side
    /// methods (`read`, `peek_slices`, `peek_contiguous`, `consume`).
    #[inline]
    pub unsafe fn read(&self, dst: &mut [u8]) -> Result<usize, RingError> {
        if dst.is_empty() {
            return Ok(0);
        }

        // Own cursor: relaxed, the consumer is its only writer.
        let read_cursor = self.consumer.cursor.load(Ordering::Relaxed);

        // Acquire pairs with the producer's release publish: bytes behind
        // the observed write cursor are fully visible.
        let write_cursor = self.producer.cursor.load(Ordering::Acquire);

        let available = write_cursor - read_cursor;
        debug_assert!(available <= self.capacity() as u64);

        if available == 0 {
            return Err(RingError::InsufficientData);
        }

        let to_read = dst.len().min(available as usize);
        let start = (read_cursor & self.mask) as usize;
        let first = to_read.min(self.capacity() - start);

        // SAFETY: [read_cursor, read_cursor + to_read) lies in the unread
        // region: published by the producer (acquire above) and not reusable
        // until we publish the new read cursor below. Bounds mirror `write`.
        unsafe {
            ptr::copy_nonoverlapping(self.storage_ptr(start), dst.as_mut_ptr(), first);
            if first < to_read {
                ptr::copy_nonoverlapping(
                    self.storage_ptr(0),
                    dst.as_mut_ptr().add(first),
                    to_read - first,
                );
            }
        }

        // Publish: release orders our copies out of the region before the
        // producer may reuse it.
        self.consumer
            .cursor
            .store(read_cursor + to_read as u64, Ordering::Release);

        Ok(to_read)
    }

    /// Returns the unread bytes as two slices in logical order, without
    /// copying.
    ///
    /// The first slice runs from the read position to the write position or
    /// the end of storage; the second is non-empty only when the unread
    /// region wraps. Both are empty when the ring is empty.
    ///
    /// # Safety
    ///
    /// Consumer-side method (see [`Ring::read`]). The returned slices must
    /// be dropped before the next consumer-side mutation: once `consume` or
    /// `read` advances the read cursor, the producer may rewrite the
    /// referenced bytes.
    #[inline]
    pub unsafe fn peek_slices(&self) -> (&[u8], &[u8]) {
        let read_cursor = self.consumer.cursor.load(Ordering::Relaxed);
        let write_cursor = self.producer.cursor.load(Ordering::Acquire);

        let available = (write_cursor - read_cursor) as usize;
        if available == 0 {
            return (&[], &[]);
        }

        let start = (read_cursor & self.mask) as usize;
        let first_len = available.min(self.capacity() - start);

        // SAFETY: the unread region is published (acquire above) and no one
        // mutates it until the read cursor advances, a consumer-side action
        // the caller is contracted to sequence after these borrows end.
        // Shared references over it therefore cannot race with the producer,
        // whose writes stay within the free region.
        unsafe {
            let first = slice::from_raw_parts(self.storage_ptr(start) as *const u8, first_len);
            let second = if first_len < available {
                slice::from_raw_parts(self.storage_ptr(0) as *const u8, available - first_len)
            } else {
                &[]
            };
            (first, second)
        }
    }

    /// Returns the longest contiguous unread run starting at the read
    /// position, without copying.
    ///
    /// May be shorter than the total available when the unread region
    /// wraps; call again after consuming to see the remainder. Empty when
    /// the ring is empty.
    ///
    /// # Safety
    ///
    /// Same contract as [`Ring::peek_slices`].
    #[inline]
    pub unsafe fn peek_contiguous(&self) -> &[u8] {
        // SAFETY: contract forwarded to the caller.
        unsafe { self.peek_slices().0 }
    }

    /// Advances the read cursor by `n` bytes without copying, after the
    /// caller has processed them via the peek methods.
    ///
    /// Fails with [`RingError::InsufficientData`] if `n` exceeds currently
    /// available bytes; the read position is unchanged on failure.
    /// `consume(0)` always succeeds as a no-op.
    ///
    /// # Safety
    ///
    /// Consumer-side method (see [`Ring::read`]). Peeked slices must be
    /// dropped first: the cursor advance frees their bytes for rewriting.
    #[inline]
    pub unsafe fn consume(&self, n: usize) -> Result<(), RingError> {
        if n == 0 {
            return Ok(());
        }

        let read_cursor = self.consumer.cursor.load(Ordering::Relaxed);
        let write_cursor = self.producer.cursor.load(Ordering::Acquire);

        if n as u64 > write_cursor - read_cursor {
            return Err(RingError::InsufficientData);
        }

        // Publish: release orders the caller's reads of the peeked bytes
        // before the producer may reuse them.
        self.consumer
            .cursor
            .store(read_cursor + n as u64, Ordering::Release);

        Ok(())
    }

    /// Returns both cursors to zero, emptying the ring.
    ///
    /// # Safety
    ///
    /// Maintenance operation outside the lock-free protocol: the caller
    /// must quiesce both sides first. No write, read, peek, or consume may
    /// be in flight on any thread, and no peeked slice may still be alive.
    pub unsafe fn reset(&self) {
        self.consumer.cursor.store(0, Ordering::Release);
        self.producer.cursor.store(0, Ordering::Release);
    }
}

// SAFETY: Ring is Send because it owns its storage and every field is Send.
unsafe impl Send for Ring {}

// SAFETY: Ring is Sync because concurrent access is mediated by the SPSC
// protocol: the cursors are atomics with Release/Acquire ordering, and any
// storage byte is mutated only by the producer while outside the unread
// region, so it is never written and read concurrently.
unsafe impl Sync for Ring {}
