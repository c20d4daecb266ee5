//! Lock-free single-producer/single-consumer byte ring buffer.
//!
//! styx moves raw bytes between exactly two threads without locks: one
//! producer writes, one consumer reads, and the two stay in sync through a
//! pair of release/acquire position counters. It targets high-throughput,
//! low-latency streaming (audio pipelines, network I/O bridging) where
//! blocking synchronization primitives are unacceptable.
//!
//! # Overview
//!
//! - [`channel`] splits a ring exactly once into a [`Producer`] and a
//!   [`Consumer`], each `Send` but not `Sync`, so the SPSC precondition
//!   holds statically instead of by documentation.
//! - Writes are all-or-nothing; reads return short counts instead of
//!   waiting.
//! - [`Consumer::peek_slices`] and [`Consumer::consume`] process unread
//!   bytes in place, without copying.
//! - No operation blocks or allocates. Spin-retry helpers with deadlines
//!   ([`Producer::write_blocking`], [`Consumer::read_blocking`]) package
//!   the caller-side retry loop.
//! - The handles implement [`std::io::Write`] and [`std::io::Read`] with
//!   nonblocking-stream semantics.
//!
//! The unsafe core lives in [`ring`] for anyone building a custom wrapper.
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! let (mut tx, mut rx) = styx::channel(1 << 16);
//!
//! let producer = thread::spawn(move || {
//!     for chunk in [&b"lock"[..], b"-", b"free"] {
//!         while tx.write(chunk).is_err() {
//!             std::hint::spin_loop();
//!         }
//!     }
//! });
//!
//! let mut received = Vec::new();
//! while received.len() < 9 {
//!     let (first, second) = rx.peek_slices();
//!     let n = first.len() + second.len();
//!     received.extend_from_slice(first);
//!     received.extend_from_slice(second);
//!     rx.consume(n).unwrap();
//! }
//!
//! producer.join().unwrap();
//! assert_eq!(received, b"lock-free");
//! ```

pub mod channel;
pub mod ring;

mod io;
mod trace;

pub use channel::{Consumer, Producer, Timeout, channel, reset};
pub use ring::{Ring, RingError};
pub use trace::init_tracing;
