//! `std::io` adapters for the channel handles.
//!
//! The ring behaves like a nonblocking byte stream: a full ring fails
//! `write` and an empty ring fails `read` with
//! [`std::io::ErrorKind::WouldBlock`], the way nonblocking sockets do. An
//! empty ring never reads as `Ok(0)`: `io` combinators take that as
//! end-of-stream, and more data may still arrive.
//!
//! The ring contracts carry over unchanged: `write` is all-or-nothing,
//! `read` returns short counts whenever fewer bytes are available.

use std::io;

use crate::channel::{Consumer, Producer};
use crate::ring::RingError;

impl From<RingError> for io::Error {
    fn from(err: RingError) -> Self {
        io::Error::new(io::ErrorKind::WouldBlock, err)
    }
}

impl io::Write for Producer {
    /// All-or-nothing: `Ok(n)` always has `n == buf.len()`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Producer::write(self, buf).map_err(io::Error::from)
    }

    /// No-op: bytes are visible to the consumer as soon as `write` returns.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for Consumer {
    /// Partial-ok: short reads are success, an empty ring is `WouldBlock`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Consumer::read(self, buf).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    // The handles' inherent `write`/`read` shadow the trait methods, so the
    // tests call the trait impls fully qualified.
    use std::io::{Read, Write};

    use super::*;
    use crate::channel::channel;

    #[test]
    fn test_io_round_trip() {
        let (mut tx, mut rx) = channel(16);

        assert_eq!(Write::write(&mut tx, b"hello").unwrap(), 5);
        tx.flush().unwrap();

        let mut buf = [0u8; 16];
        let n = Read::read(&mut rx, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_write_full_is_would_block() {
        let (mut tx, _rx) = channel(4);

        tx.write_all(&[1, 2, 3, 4]).unwrap();

        let err = Write::write(&mut tx, &[5]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_read_empty_is_would_block() {
        let (_tx, mut rx) = channel(4);

        let mut buf = [0u8; 4];
        let err = Read::read(&mut rx, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_write_keeps_all_or_nothing() {
        let (mut tx, mut rx) = channel(8);

        tx.write_all(&[1, 2, 3, 4, 5]).unwrap();

        // An io write that does not fit must not become a partial write.
        let err = Write::write(&mut tx, &[6, 7, 8, 9]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(tx.available_read(), 5);

        let mut buf = [0u8; 8];
        let n = Read::read(&mut rx, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_read_is_partial_ok() {
        let (mut tx, mut rx) = channel(8);

        tx.write_all(&[1, 2, 3]).unwrap();

        // Destination larger than available: short read, no error.
        let mut buf = [0u8; 8];
        assert_eq!(Read::read(&mut rx, &mut buf).unwrap(), 3);
    }

    #[test]
    fn test_error_source_is_ring_error() {
        let err = io::Error::from(RingError::InsufficientSpace);
        let inner = err.get_ref().unwrap();
        assert_eq!(inner.to_string(), "insufficient space in ring buffer");
    }
}
