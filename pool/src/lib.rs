//! Allocate transient data in bulk-freed pools.
//!
//! # Overview
//!
//! Memory is allocated in pools which can be freed as a single operation.
//! The idea is to make memory management for transient data structures
//! (request-scoped string building, scratch parse trees) easier than
//! tracking every allocation individually, at the cost of using more memory
//! than direct allocation would.
//!
//! Two types carry the library:
//! - [`Pool`]: a bump allocator over a collection of blocks. Small
//!   allocations are O(1) pointer bumps; a request larger than the block
//!   size gets a dedicated one-shot block. Dropping the pool releases every
//!   block and every registered buffer at once, and the borrow checker
//!   keeps every handed-out region from outliving it.
//! - [`StrBuf`]: a growable byte buffer with amortized-doubling growth,
//!   formatted append ([`Arg`] directives), and percent-encoding. Its
//!   storage is independent of any pool's blocks, but a buffer created with
//!   [`Pool::strbuf`] is released by the pool's teardown.
//!
//! Pool-backed string helpers ([`Pool::alloc_str`], [`Pool::concat`],
//! [`Pool::printf`], [`Pool::join`]) build terminated strings directly in
//! pool regions, sizing each allocation exactly before writing a byte.
//!
//! Neither type is thread-safe; use one pool per thread or serialize access
//! externally. Independent pools share nothing.
//!
//! # Example
//!
//! ```
//! use stash_pool::Pool;
//!
//! let pool = Pool::new();
//! let greeting = pool.concat("hello, ", "world");
//! assert_eq!(greeting, "hello, world");
//!
//! let label = pool.printf("request %lu", &[42u64.into()])?;
//! assert_eq!(label, "request 42");
//!
//! let buf = pool.strbuf(0);
//! buf.put_str("q=");
//! buf.encode_url(b"a b");
//! assert_eq!(buf.fetch(), b"q=a%20b");
//! # Ok::<(), stash_pool::Error>(())
//! ```

mod encode;
mod error;
mod format;
mod pool;
mod source;
mod strbuf;

pub use error::Error;
pub use format::Arg;
pub use pool::Pool;
pub use source::{MemorySource, SystemSource};
pub use strbuf::StrBuf;
