//! Growable byte buffer with amortized-doubling growth.
//!
//! A [`StrBuf`] accumulates bytes through appends, formatted appends, and
//! percent-encoding, then yields its content through [`StrBuf::fetch`] or
//! [`StrBuf::freeze`]. Its backing storage is independently reallocatable,
//! never carved out of a pool's bump blocks, so a buffer can outgrow any
//! block without fragmenting the pool it may be registered with.

use crate::format::{self, Arg, Sink};
use crate::Error;
use bytes::Bytes;
use tracing::trace;

/// Storage granted to buffers created with a zero capacity request.
const PREFERRED_CAPACITY: usize = 32;

/// An appendable byte sequence.
///
/// The logical length only moves forward on appends and backward on
/// [`rewind`](Self::rewind); capacity never shrinks, and every growth event
/// at least doubles it, bounding the amortized cost of [`put_u8`](Self::put_u8)
/// at O(1).
///
/// Buffers are either standalone (released on drop) or registered with a
/// [`Pool`](crate::Pool) via [`Pool::strbuf`](crate::Pool::strbuf), in which
/// case the pool releases them in bulk at teardown.
#[derive(Debug)]
pub struct StrBuf {
    data: Vec<u8>,
}

impl StrBuf {
    /// Creates a buffer with the preferred initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(PREFERRED_CAPACITY)
    }

    /// Creates a buffer with room for `capacity` bytes.
    ///
    /// A zero `capacity` is coerced to the preferred default.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity > 0 {
            capacity
        } else {
            PREFERRED_CAPACITY
        };
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Appends one byte, doubling capacity when full.
    #[inline]
    pub fn put_u8(&mut self, byte: u8) {
        if self.data.len() == self.data.capacity() {
            self.grow();
        }
        self.data.push(byte);
    }

    /// Appends a byte slice via the same growth policy.
    pub fn put_slice(&mut self, bytes: &[u8]) {
        while self.data.capacity() - self.data.len() < bytes.len() {
            self.grow();
        }
        self.data.extend_from_slice(bytes);
    }

    /// Appends the bytes of `text`.
    pub fn put_str(&mut self, text: &str) {
        self.put_slice(text.as_bytes());
    }

    /// Appends formatted text; see [`Arg`] for the directive set.
    ///
    /// On error the buffer keeps the bytes appended before the failing
    /// directive.
    pub fn format(&mut self, fmt: &str, args: &[Arg]) -> Result<(), Error> {
        format::walk(fmt, args, self)
    }

    /// Grows storage to hold at least `min_capacity` bytes without touching
    /// the logical length.
    ///
    /// Used by callers that need a direct-write capacity guarantee; unlike
    /// append-driven growth this reserves exactly what was asked.
    pub fn reserve(&mut self, min_capacity: usize) {
        if min_capacity > self.data.capacity() {
            self.data.reserve_exact(min_capacity - self.data.len());
        }
    }

    /// Truncates the logical length to `offset`.
    ///
    /// Storage is not released. An `offset` at or past the current length
    /// does nothing.
    pub fn rewind(&mut self, offset: usize) {
        self.data.truncate(offset);
    }

    /// Returns the current content, leaving a terminator byte in storage
    /// just past the logical length.
    ///
    /// The terminator is not counted by [`len`](Self::len) and is absent
    /// from the returned slice; repeated calls without intervening mutation
    /// return the same content.
    pub fn fetch(&mut self) -> &[u8] {
        self.put_u8(0);
        let len = self.data.len() - 1;
        self.data.truncate(len);
        &self.data
    }

    /// Current logical length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether no bytes have been appended (or all were rewound).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Current content as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer, handing its content off as [`Bytes`].
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.data)
    }

    fn grow(&mut self) {
        // Unconditional doubling, independent of how full the buffer is.
        let capacity = self.data.capacity().max(1);
        self.data.reserve_exact(2 * capacity - self.data.len());
        trace!(capacity = self.data.capacity(), "grew buffer");
    }
}

impl Default for StrBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StrBuf {
    fn put(&mut self, byte: u8) {
        self.put_u8(byte);
    }

    fn put_all(&mut self, bytes: &[u8]) {
        self.put_slice(bytes);
    }
}
