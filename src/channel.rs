//! Safe producer/consumer handles over the lock-free byte ring.
//!
//! # Overview
//!
//! - [`Producer`] - Write end (single producer per channel)
//! - [`Consumer`] - Read end (single consumer per channel)
//! - Lock-free, wait-free: no mutexes or syscalls in the hot path
//!
//! [`channel`] splits a ring exactly once into the two ends, so the
//! single-producer/single-consumer precondition of [`crate::ring::Ring`]
//! holds by construction: each end is `Send` but not `Sync` and cannot be
//! cloned.
//!
//! # Example
//!
//! ```
//! let (mut tx, mut rx) = styx::channel(1024);
//!
//! // Producer thread
//! tx.write(b"hello").expect("ring full");
//!
//! // Consumer thread
//! let mut buf = [0u8; 16];
//! assert_eq!(rx.read(&mut buf), Ok(5));
//! assert_eq!(&buf[..5], b"hello");
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use minstant::Instant;

use crate::ring::{Ring, RingError};
use crate::trace::debug;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of the byte channel.
///
/// Only one producer exists per channel: [`channel`] hands out exactly one
/// and it cannot be cloned.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Producer` (no concurrent `write()`)
pub struct Producer {
    ring: Arc<Ring>,
    _unsync: PhantomUnsync,
}

/// Read end of the byte channel.
///
/// Only one consumer exists per channel. See [`Producer`] for thread safety
/// details (same semantics apply).
pub struct Consumer {
    ring: Arc<Ring>,
    _unsync: PhantomUnsync,
}

/// Creates a byte channel with at least the requested capacity.
///
/// Capacity is rounded up to the next power of two; a request of 0 yields
/// capacity 1. Returns a `(Producer, Consumer)` pair; each end can be sent
/// to its own thread.
///
/// # Example
///
/// ```
/// let (mut tx, mut rx) = styx::channel(100);
/// assert_eq!(tx.capacity(), 128);
///
/// tx.write(&[1, 2, 3]).unwrap();
/// assert_eq!(rx.available_read(), 3);
/// ```
#[must_use]
pub fn channel(capacity: usize) -> (Producer, Consumer) {
    let ring = Arc::new(Ring::new(capacity));
    debug!("byte channel created, capacity={}", ring.capacity());

    let producer = Producer {
        ring: Arc::clone(&ring),
        _unsync: PhantomData,
    };

    let consumer = Consumer {
        ring,
        _unsync: PhantomData,
    };

    (producer, consumer)
}

impl Producer {
    /// Writes all of `data`, or nothing (wait-free).
    ///
    /// Returns `data.len()` on success; `write(&[])` is a no-op returning 0.
    /// There is no partial write.
    ///
    /// # Errors
    ///
    /// [`RingError::InsufficientSpace`] if free space is smaller than
    /// `data.len()`; the ring is untouched and the call may be retried
    /// after the consumer drains.
    #[inline]
    pub fn write(&mut self, data: &[u8]) -> Result<usize, RingError> {
        // SAFETY: `channel` hands out exactly one non-cloneable producer,
        // and `!Sync` keeps `&Producer` on one thread, so no other thread
        // can be inside a producer-side method.
        unsafe { self.ring.write(data) }
    }

    /// Spins until `data` fits, then writes it.
    ///
    /// A chunk larger than the ring's capacity can never fit and fails
    /// immediately instead of spinning.
    ///
    /// # Errors
    ///
    /// [`RingError::InsufficientSpace`] on timeout.
    pub fn write_blocking(&mut self, data: &[u8], timeout: Timeout) -> Result<usize, RingError> {
        if data.len() > self.ring.capacity() {
            return Err(RingError::InsufficientSpace);
        }
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };
        loop {
            match self.write(data) {
                Ok(n) => return Ok(n),
                Err(err) => {
                    if let Some(dl) = deadline
                        && Instant::now() > dl
                    {
                        return Err(err);
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Bytes currently free for writing (best-effort snapshot).
    #[inline]
    #[must_use]
    pub fn available_write(&self) -> usize {
        self.ring.available_write()
    }

    /// Bytes currently waiting to be read (best-effort snapshot).
    #[inline]
    #[must_use]
    pub fn available_read(&self) -> usize {
        self.ring.available_read()
    }

    /// Total capacity in bytes (always a power of two).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl Consumer {
    /// Reads up to `dst.len()` bytes into `dst` (wait-free).
    ///
    /// A short read is success: whenever fewer bytes than requested are
    /// available, exactly those are returned. `read` into an empty slice is
    /// a no-op returning 0.
    ///
    /// # Errors
    ///
    /// [`RingError::InsufficientData`] if the ring is empty; retry after
    /// the producer writes.
    #[inline]
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, RingError> {
        // SAFETY: `channel` hands out exactly one non-cloneable consumer,
        // and `!Sync` keeps `&Consumer` on one thread, so no other thread
        // can be inside a consumer-side method. `&mut self` ends any
        // outstanding peek borrows before the cursor moves.
        unsafe { self.ring.read(dst) }
    }

    /// Spins until at least one byte arrives, then reads.
    ///
    /// # Errors
    ///
    /// [`RingError::InsufficientData`] on timeout.
    pub fn read_blocking(&mut self, dst: &mut [u8], timeout: Timeout) -> Result<usize, RingError> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };
        loop {
            match self.read(dst) {
                Ok(n) => return Ok(n),
                Err(err) => {
                    if let Some(dl) = deadline
                        && Instant::now() > dl
                    {
                        return Err(err);
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Returns the unread bytes as two slices in logical order, without
    /// copying.
    ///
    /// The second slice is non-empty only when the unread region wraps
    /// around the end of storage; both are empty when the ring is empty.
    /// The slices borrow `self`, so the borrow checker guarantees they are
    /// gone before the next [`Consumer::consume`] or [`Consumer::read`]
    /// frees the bytes for rewriting.
    ///
    /// # Example
    ///
    /// ```
    /// let (mut tx, mut rx) = styx::channel(8);
    /// tx.write(&[1, 2, 3]).unwrap();
    ///
    /// let (first, second) = rx.peek_slices();
    /// let n = first.len() + second.len();
    /// assert_eq!(first, &[1, 2, 3]);
    /// assert!(second.is_empty());
    ///
    /// rx.consume(n).unwrap();
    /// assert_eq!(rx.available_read(), 0);
    /// ```
    #[inline]
    #[must_use]
    pub fn peek_slices(&self) -> (&[u8], &[u8]) {
        // SAFETY: single consumer as in `read`. The returned borrows hold
        // `self` shared, so no consumer-side mutation can advance the read
        // cursor while they are alive.
        unsafe { self.ring.peek_slices() }
    }

    /// Returns the longest contiguous unread run, without copying.
    ///
    /// May be shorter than the total available when the unread region
    /// wraps; consume and call again to see the remainder.
    #[inline]
    #[must_use]
    pub fn peek_contiguous(&self) -> &[u8] {
        // SAFETY: as `peek_slices`.
        unsafe { self.ring.peek_contiguous() }
    }

    /// Advances the read position by `n` bytes after the caller processed
    /// them via the peek methods.
    ///
    /// `consume(0)` always succeeds as a no-op.
    ///
    /// # Errors
    ///
    /// [`RingError::InsufficientData`] if `n` exceeds currently available
    /// bytes; the read position is unchanged.
    #[inline]
    pub fn consume(&mut self, n: usize) -> Result<(), RingError> {
        // SAFETY: single consumer as in `read`; `&mut self` proves no peek
        // borrow survives into the cursor advance.
        unsafe { self.ring.consume(n) }
    }

    /// Bytes currently waiting to be read (best-effort snapshot).
    #[inline]
    #[must_use]
    pub fn available_read(&self) -> usize {
        self.ring.available_read()
    }

    /// Bytes currently free for writing (best-effort snapshot).
    #[inline]
    #[must_use]
    pub fn available_write(&self) -> usize {
        self.ring.available_write()
    }

    /// Total capacity in bytes (always a power of two).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Empties a channel by returning both cursors to zero.
///
/// Resetting is a maintenance operation, not part of the lock-free
/// protocol: it is only defined while no write or read is in flight.
/// Demanding `&mut` access to both ends proves that statically, since
/// neither thread can be inside an operation while the caller holds these
/// borrows.
///
/// # Panics
///
/// Panics if the two handles belong to different channels.
///
/// # Example
///
/// ```
/// let (mut tx, mut rx) = styx::channel(8);
/// tx.write(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
/// assert_eq!(tx.available_write(), 0);
///
/// styx::reset(&mut tx, &mut rx);
/// assert_eq!(tx.available_write(), 8);
/// assert_eq!(rx.available_read(), 0);
/// ```
pub fn reset(producer: &mut Producer, consumer: &mut Consumer) {
    assert!(
        Arc::ptr_eq(&producer.ring, &consumer.ring),
        "reset requires both ends of the same channel"
    );
    debug!("channel reset, capacity={}", producer.ring.capacity());

    // SAFETY: the exclusive borrows quiesce both sides, and the handles are
    // the only entry points to this ring.
    unsafe { producer.ring.reset() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_write_read() {
        let (mut tx, mut rx) = channel(16);

        assert_eq!(tx.write(b"abc"), Ok(3));

        let mut buf = [0u8; 16];
        assert_eq!(rx.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(rx.read(&mut buf), Err(RingError::InsufficientData));
    }

    #[test]
    fn test_write_when_full() {
        let (mut tx, mut rx) = channel(4);

        assert_eq!(tx.write(&[1, 2, 3, 4]), Ok(4));
        assert_eq!(tx.write(&[5]), Err(RingError::InsufficientSpace));

        let mut buf = [0u8; 1];
        assert_eq!(rx.read(&mut buf), Ok(1));
        assert_eq!(buf, [1]);

        assert_eq!(tx.write(&[5]), Ok(1));
        assert_eq!(tx.write(&[6]), Err(RingError::InsufficientSpace));
    }

    #[test]
    fn test_read_when_empty() {
        let (mut tx, mut rx) = channel(8);

        let mut buf = [0u8; 8];
        assert_eq!(rx.read(&mut buf), Err(RingError::InsufficientData));

        tx.write(&[42]).unwrap();
        assert_eq!(rx.read(&mut buf), Ok(1));
        assert_eq!(buf[0], 42);
        assert_eq!(rx.read(&mut buf), Err(RingError::InsufficientData));
    }

    #[test]
    fn test_wrapping_rounds() {
        let (mut tx, mut rx) = channel(4);

        for round in 0..5u8 {
            let chunk = [round * 10, round * 10 + 1, round * 10 + 2, round * 10 + 3];
            assert_eq!(tx.write(&chunk), Ok(4));

            let mut buf = [0u8; 4];
            assert_eq!(rx.read(&mut buf), Ok(4));
            assert_eq!(buf, chunk);
        }
    }

    #[test]
    fn test_interleaved_operations() {
        let (mut tx, mut rx) = channel(8);
        let mut buf = [0u8; 8];

        tx.write(&[1, 2]).unwrap();
        assert_eq!(rx.read(&mut buf[..1]), Ok(1));
        assert_eq!(buf[0], 1);

        tx.write(&[3, 4, 5]).unwrap();
        assert_eq!(rx.read(&mut buf), Ok(4));
        assert_eq!(&buf[..4], &[2, 3, 4, 5]);

        tx.write(&[6]).unwrap();
        assert_eq!(rx.read(&mut buf), Ok(1));
        assert_eq!(buf[0], 6);
    }

    #[test]
    fn test_queries_from_both_ends() {
        let (mut tx, rx) = channel(100);

        assert_eq!(tx.capacity(), 128);
        assert_eq!(rx.capacity(), 128);

        tx.write(&[0; 28]).unwrap();
        assert_eq!(tx.available_read(), 28);
        assert_eq!(rx.available_read(), 28);
        assert_eq!(tx.available_write(), 100);
        assert_eq!(rx.available_write(), 100);
    }

    #[test]
    fn test_send_to_thread() {
        let (mut tx, mut rx) = channel(64);

        let handle = std::thread::spawn(move || {
            for i in 0..10u8 {
                tx.write(&[i]).unwrap();
            }
        });

        handle.join().unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(rx.read(&mut buf), Ok(10));
        for (i, &byte) in buf[..10].iter().enumerate() {
            assert_eq!(byte, i as u8);
        }
    }

    #[test]
    fn test_concurrent_write_read() {
        let (mut tx, mut rx) = channel(64);
        let total: usize = 100_000;

        let producer_handle = std::thread::spawn(move || {
            let mut next: u8 = 0;
            let mut sent = 0;
            while sent < total {
                let chunk_len = (sent % 31 + 1).min(total - sent);
                let chunk: Vec<u8> = (0..chunk_len)
                    .map(|_| {
                        let byte = next;
                        next = next.wrapping_add(1);
                        byte
                    })
                    .collect();
                while tx.write(&chunk).is_err() {
                    std::hint::spin_loop();
                }
                sent += chunk_len;
            }
        });

        let consumer_handle = std::thread::spawn(move || {
            let mut expected: u8 = 0;
            let mut received = 0;
            let mut buf = [0u8; 64];
            while received < total {
                match rx.read(&mut buf) {
                    Ok(n) => {
                        for &byte in &buf[..n] {
                            assert_eq!(byte, expected, "corruption at byte {received}");
                            expected = expected.wrapping_add(1);
                        }
                        received += n;
                    }
                    Err(_) => std::hint::spin_loop(),
                }
            }
            received
        });

        producer_handle.join().unwrap();
        let received = consumer_handle.join().unwrap();
        assert_eq!(received, total);
    }

    #[test]
    fn test_write_blocking_timeout() {
        let (mut tx, _rx) = channel(4);

        tx.write(&[1, 2, 3, 4]).unwrap();

        let result = tx.write_blocking(&[5], Duration::from_millis(10).into());
        assert_eq!(result, Err(RingError::InsufficientSpace));
        // The full ring is untouched by the failed attempt.
        assert_eq!(tx.available_write(), 0);
    }

    #[test]
    fn test_write_blocking_oversized_chunk() {
        let (mut tx, _rx) = channel(4);

        // Larger than capacity: fails fast even with an infinite timeout.
        let result = tx.write_blocking(&[0; 5], Timeout::Infinite);
        assert_eq!(result, Err(RingError::InsufficientSpace));
    }

    #[test]
    fn test_read_blocking_timeout() {
        let (_tx, mut rx) = channel(4);

        let mut buf = [0u8; 4];
        let result = rx.read_blocking(&mut buf, Duration::from_millis(10).into());
        assert_eq!(result, Err(RingError::InsufficientData));
    }

    #[test]
    fn test_blocking_round_trip() {
        let (mut tx, mut rx) = channel(8);

        let producer_handle = std::thread::spawn(move || {
            for i in 0..100u8 {
                tx.write_blocking(&[i], Timeout::Infinite).unwrap();
            }
        });

        let mut buf = [0u8; 8];
        let mut expected: u8 = 0;
        while expected < 100 {
            let n = rx.read_blocking(&mut buf, Timeout::Infinite).unwrap();
            for &byte in &buf[..n] {
                assert_eq!(byte, expected);
                expected += 1;
            }
        }

        producer_handle.join().unwrap();
    }

    #[test]
    fn test_peek_then_consume() {
        let (mut tx, mut rx) = channel(8);

        tx.write(&[1, 2, 3, 4, 5]).unwrap();

        let (first, second) = rx.peek_slices();
        assert_eq!(first, &[1, 2, 3, 4, 5]);
        assert!(second.is_empty());
        let n = first.len() + second.len();

        rx.consume(n).unwrap();
        assert_eq!(rx.available_read(), 0);
        assert_eq!(rx.consume(1), Err(RingError::InsufficientData));
    }

    #[test]
    fn test_reset_via_handles() {
        let (mut tx, mut rx) = channel(8);

        tx.write(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(tx.write(&[9]), Err(RingError::InsufficientSpace));

        reset(&mut tx, &mut rx);

        assert_eq!(rx.available_read(), 0);
        assert_eq!(tx.available_write(), 8);

        // FIFO restarts clean after the reset.
        tx.write(&[10, 11]).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(rx.read(&mut buf), Ok(2));
        assert_eq!(&buf[..2], &[10, 11]);
    }

    #[test]
    #[should_panic(expected = "same channel")]
    fn test_reset_mismatched_channels() {
        let (mut tx, _rx) = channel(8);
        let (_tx2, mut rx2) = channel(8);

        reset(&mut tx, &mut rx2);
    }
}
