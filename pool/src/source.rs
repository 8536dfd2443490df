//! Raw memory sourcing for pools.
//!
//! A [`MemorySource`] is the capability a [`Pool`](crate::Pool) draws its
//! blocks from. The default [`SystemSource`] reports exhaustion as an error,
//! which the pool's `try_` entry points propagate; the pool's infallible
//! entry points instead abort the process with a diagnostic, preserving the
//! classic arena policy that exhaustion of the backing allocator is not a
//! recoverable condition.

use crate::Error;
use tracing::error;

/// Source of raw backing memory for a pool.
pub trait MemorySource {
    /// Allocates an empty buffer with room for exactly `capacity` bytes.
    fn reserve(&self, capacity: usize) -> Result<Vec<u8>, Error>;
}

/// Draws blocks from the global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemSource;

impl MemorySource for SystemSource {
    fn reserve(&self, capacity: usize) -> Result<Vec<u8>, Error> {
        let mut block = Vec::new();
        block
            .try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailed(capacity))?;
        Ok(block)
    }
}

/// Unwraps an allocation result, aborting the process on failure.
pub(crate) fn must<T>(result: Result<T, Error>, size: usize) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(size, %err, "cannot allocate");
            std::process::abort();
        }
    }
}
