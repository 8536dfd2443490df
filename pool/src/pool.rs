//! Bulk-allocation pools.
//!
//! A [`Pool`] owns a collection of memory blocks and serves allocations by
//! bumping an offset within the current block, creating a new block when the
//! current one cannot satisfy a request. Nothing is freed individually:
//! dropping the pool releases every block and every registered buffer in one
//! operation. This trades memory for allocation speed and teardown
//! simplicity, which suits transient (e.g. request-scoped) data.
//!
//! Every region handed out borrows the pool, so the borrow checker forbids
//! touching a region after the pool that owns it is gone.

// Handing out `&mut` regions from `&self` is the whole point of a bump
// allocator; the regions are pairwise disjoint by construction.
#![allow(clippy::mut_from_ref)]

use crate::format::{self, SliceWriter};
use crate::source::{must, MemorySource, SystemSource};
use crate::{Arg, Error, StrBuf};
use std::cell::{Cell, RefCell};
use tracing::trace;

/// Block size granted to pools created with a zero block size request.
const PREFERRED_BLOCK_SIZE: usize = 4096;

/// A bump allocator over a chain of blocks, released as one unit.
///
/// Small requests are served from the current bump block in O(1). A request
/// that does not fit rolls a fresh block of the default size (abandoning the
/// old block's remainder), while a request larger than the default size gets
/// a dedicated one-shot block so large allocations never fragment the block
/// that small ones are bumping through.
///
/// The memory source is injectable for callers that need to observe or
/// replace the backing allocator; [`SystemSource`] is the default.
pub struct Pool<S: MemorySource = SystemSource> {
    source: S,
    block_size: usize,
    blocks: RefCell<Vec<Vec<u8>>>,
    /// Index of the block currently being bumped through.
    bump: Cell<usize>,
    /// Remaining bytes in the bump block; space in any other block is
    /// permanently unusable until teardown.
    avail: Cell<usize>,
    bufs: RefCell<Vec<Box<StrBuf>>>,
}

impl Pool {
    /// Creates a pool with the preferred default block size.
    pub fn new() -> Self {
        Self::with_block_size(PREFERRED_BLOCK_SIZE)
    }

    /// Creates a pool serving small allocations from blocks of `block_size`
    /// bytes.
    ///
    /// A zero `block_size` is coerced to the preferred default. The pool
    /// starts with no blocks, so the first allocation always creates one.
    pub fn with_block_size(block_size: usize) -> Self {
        Self::with_source(SystemSource, block_size)
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MemorySource> Pool<S> {
    /// Creates a pool drawing blocks from `source`.
    pub fn with_source(source: S, block_size: usize) -> Self {
        let block_size = if block_size > 0 {
            block_size
        } else {
            PREFERRED_BLOCK_SIZE
        };
        Self {
            source,
            block_size,
            blocks: RefCell::new(Vec::new()),
            bump: Cell::new(0),
            avail: Cell::new(0),
            bufs: RefCell::new(Vec::new()),
        }
    }

    /// Allocates a zeroed region of `size` bytes, aborting the process if
    /// the memory source is exhausted.
    ///
    /// There is no alignment guarantee beyond byte alignment; callers that
    /// need stricter alignment must pad themselves.
    pub fn alloc(&self, size: usize) -> &mut [u8] {
        must(self.try_alloc(size), size)
    }

    /// Allocates a zeroed region of `size` bytes, surfacing exhaustion of
    /// the memory source as an error.
    ///
    /// A `size` of zero returns a valid empty region without touching the
    /// block collection.
    pub fn try_alloc(&self, size: usize) -> Result<&mut [u8], Error> {
        if size == 0 {
            return Ok(&mut []);
        }
        if size <= self.avail.get() {
            return Ok(self.bump_split(size));
        }
        if size > self.block_size {
            // One-shot block sized to the request. The bump target is left
            // unchanged so its remainder keeps serving small allocations.
            let mut block = self.source.reserve(size)?;
            block.resize(size, 0);
            let mut blocks = self.blocks.borrow_mut();
            blocks.push(block);
            let data = blocks.last_mut().expect("just pushed").as_mut_ptr();
            trace!(size, "dedicated block");
            // SAFETY: the block was created with exactly `size` bytes and its
            // heap storage is never resized or released while the pool lives;
            // the returned borrow ties the region to the pool.
            return Ok(unsafe { std::slice::from_raw_parts_mut(data, size) });
        }
        // Roll a fresh bump block, abandoning the old block's remainder.
        let block = self.source.reserve(self.block_size)?;
        {
            let mut blocks = self.blocks.borrow_mut();
            blocks.push(block);
            self.bump.set(blocks.len() - 1);
        }
        self.avail.set(self.block_size);
        trace!(capacity = self.block_size, "new block");
        Ok(self.bump_split(size))
    }

    /// Claims the next `size` bytes of the bump block. Callers must have
    /// checked that they fit.
    fn bump_split(&self, size: usize) -> &mut [u8] {
        let mut blocks = self.blocks.borrow_mut();
        let block = &mut blocks[self.bump.get()];
        let start = block.len();
        block.resize(start + size, 0);
        self.avail.set(self.avail.get() - size);
        // SAFETY: `start..start + size` is claimed exactly once (the bump
        // offset only moves forward), and the block's heap storage never
        // moves because `resize` stays within the capacity reserved at
        // creation. The returned borrow ties the region to the pool.
        unsafe { std::slice::from_raw_parts_mut(block.as_mut_ptr().add(start), size) }
    }

    /// Copies `value` into the pool.
    pub fn alloc_str(&self, value: &str) -> &str {
        self.splice(&[value])
    }

    /// Concatenates two strings into one pool region.
    pub fn concat(&self, s1: &str, s2: &str) -> &str {
        self.splice(&[s1, s2])
    }

    /// Concatenates three strings into one pool region.
    pub fn concat3(&self, s1: &str, s2: &str, s3: &str) -> &str {
        self.splice(&[s1, s2, s3])
    }

    /// Renders `fmt` with `args` into a pool region of exactly the rendered
    /// size; see [`Arg`] for the directive set.
    ///
    /// Two-phase: a size pass measures (and fully validates) the output,
    /// one region is allocated, then a render pass fills it.
    pub fn printf(&self, fmt: &str, args: &[Arg]) -> Result<&str, Error> {
        let size = format::measure(fmt, args)?;
        let region = self.alloc(size + 1);
        {
            let mut writer = SliceWriter::new(&mut region[..size]);
            format::walk(fmt, args, &mut writer)?;
            assert_eq!(writer.filled(), size, "render did not write the measured bytes");
        }
        let region: &[u8] = region;
        // SAFETY: every directive renders UTF-8 fragments of UTF-8 inputs.
        Ok(unsafe { std::str::from_utf8_unchecked(&region[..size]) })
    }

    /// Joins `items` with `separator` into one pool region sized from a
    /// precomputed total.
    ///
    /// The separator goes between adjacent non-empty entries; empty entries
    /// contribute nothing.
    pub fn join(&self, separator: char, items: &[&str]) -> &str {
        let mut encoded = [0u8; 4];
        let separator = separator.encode_utf8(&mut encoded).as_bytes();

        let mut total = 0;
        for item in items {
            if item.is_empty() {
                continue;
            }
            if total > 0 {
                total += separator.len();
            }
            total += item.len();
        }

        let region = self.alloc(total + 1);
        let mut offset = 0;
        for item in items {
            if item.is_empty() {
                continue;
            }
            if offset > 0 {
                region[offset..offset + separator.len()].copy_from_slice(separator);
                offset += separator.len();
            }
            region[offset..offset + item.len()].copy_from_slice(item.as_bytes());
            offset += item.len();
        }
        let region: &[u8] = region;
        // SAFETY: the region holds UTF-8 `items` joined by a UTF-8 separator.
        unsafe { std::str::from_utf8_unchecked(&region[..total]) }
    }

    /// Creates a [`StrBuf`] registered with this pool, so teardown reaches
    /// it.
    ///
    /// The buffer's backing storage still grows independently of the pool's
    /// blocks; only its lifetime is bound to the pool.
    pub fn strbuf(&self, capacity: usize) -> &mut StrBuf {
        let mut bufs = self.bufs.borrow_mut();
        bufs.push(Box::new(StrBuf::with_capacity(capacity)));
        let buf: *mut StrBuf = &mut **bufs.last_mut().expect("just pushed");
        // SAFETY: the box gives the buffer a stable address, the registry
        // only appends, and the pool does not touch registered buffers again
        // before teardown, which the returned borrow postpones past every
        // use of the buffer.
        unsafe { &mut *buf }
    }

    /// Copies the bytes of `value` into the pool.
    pub fn alloc_slice(&self, value: &[u8]) -> &mut [u8] {
        let region = self.alloc(value.len());
        region.copy_from_slice(value);
        region
    }

    /// The default block size small allocations are served from.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Remaining bytes in the current bump block.
    pub fn available(&self) -> usize {
        self.avail.get()
    }

    /// Number of blocks created so far.
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Number of buffers registered for teardown.
    pub fn buffer_count(&self) -> usize {
        self.bufs.borrow().len()
    }

    fn splice(&self, parts: &[&str]) -> &str {
        let total: usize = parts.iter().map(|part| part.len()).sum();
        let region = self.alloc(total + 1);
        let mut offset = 0;
        for part in parts {
            region[offset..offset + part.len()].copy_from_slice(part.as_bytes());
            offset += part.len();
        }
        let region: &[u8] = region;
        // SAFETY: the region holds exactly the bytes of UTF-8 `parts`.
        unsafe { std::str::from_utf8_unchecked(&region[..total]) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::rc::Rc;

    #[test]
    fn test_starts_empty() {
        let pool = Pool::with_block_size(128);
        assert_eq!(pool.block_count(), 0);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.buffer_count(), 0);
    }

    #[test]
    fn test_first_alloc_creates_block() {
        let pool = Pool::with_block_size(128);
        let region = pool.alloc(16);
        assert_eq!(region.len(), 16);
        assert!(region.iter().all(|&byte| byte == 0));
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.available(), 112);
    }

    #[test]
    fn test_fast_path_bumps_in_place() {
        let pool = Pool::with_block_size(128);
        pool.alloc(16);
        pool.alloc(16);
        pool.alloc(16);
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.available(), 128 - 48);
    }

    #[test]
    fn test_zero_size_alloc() {
        let pool = Pool::with_block_size(128);
        let region = pool.alloc(0);
        assert!(region.is_empty());
        assert_eq!(pool.block_count(), 0);
    }

    #[test]
    fn test_zero_block_size_coerced() {
        let pool = Pool::with_block_size(0);
        assert_eq!(pool.block_size(), 4096);
    }

    #[test]
    fn test_overflow_rolls_new_block() {
        let pool = Pool::with_block_size(64);
        pool.alloc(48);
        assert_eq!(pool.available(), 16);

        // Doesn't fit the remainder; the remainder is abandoned.
        pool.alloc(32);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.available(), 32);
    }

    #[test]
    fn test_exact_block_size_is_not_oversize() {
        let pool = Pool::with_block_size(64);
        pool.alloc(64);
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_oversize_gets_dedicated_block() {
        let pool = Pool::with_block_size(64);
        pool.alloc(16);
        assert_eq!(pool.available(), 48);

        // Larger than the block size: one-shot block, bump target untouched.
        let region = pool.alloc(100);
        assert_eq!(region.len(), 100);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.available(), 48);

        // Small allocations keep landing in the old block.
        pool.alloc(40);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.available(), 8);
    }

    #[test]
    fn test_oversize_first_allocation() {
        let pool = Pool::with_block_size(64);
        pool.alloc(100);
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.available(), 0);

        pool.alloc(8);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.available(), 56);
    }

    #[test]
    fn test_regions_disjoint() {
        let mut rng = StdRng::seed_from_u64(42);
        let pool = Pool::with_block_size(256);

        // Tag every region, then check that no write bled into another.
        let mut regions = Vec::new();
        for tag in 0..100u8 {
            let size = rng.gen_range(0..400);
            let region = pool.alloc(size);
            region.fill(tag);
            regions.push((tag, region));
        }
        for (tag, region) in &regions {
            assert!(region.iter().all(|byte| byte == tag));
        }

        // Address spans are pairwise disjoint.
        let mut spans: Vec<(usize, usize)> = regions
            .iter()
            .map(|(_, region)| (region.as_ptr() as usize, region.len()))
            .collect();
        spans.sort();
        for pair in spans.windows(2) {
            assert!(pair[0].0 + pair[0].1 <= pair[1].0);
        }

        // Each non-empty region lies within exactly one block.
        let blocks = pool.blocks.borrow();
        for (_, region) in &regions {
            if region.is_empty() {
                continue;
            }
            let start = region.as_ptr() as usize;
            let owners = blocks
                .iter()
                .filter(|block| {
                    let base = block.as_ptr() as usize;
                    start >= base && start + region.len() <= base + block.capacity()
                })
                .count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    fn test_alloc_str() {
        let pool = Pool::new();
        let value = pool.alloc_str("p_strdup");
        assert_eq!(value, "p_strdup");
        assert_eq!(value.len(), 8);
    }

    #[test]
    fn test_concat() {
        let pool = Pool::new();
        let value = pool.concat("p_", "strcat");
        assert_eq!(value, "p_strcat");
        assert_eq!(value.len(), 8);
    }

    #[test]
    fn test_concat3() {
        let pool = Pool::new();
        let value = pool.concat3("p_", "strcat", "3");
        assert_eq!(value, "p_strcat3");
        assert_eq!(value.len(), 9);
    }

    #[test]
    fn test_printf() {
        let pool = Pool::new();
        let value = pool.printf("p_%s %d", &["printf".into(), 4i32.into()]).unwrap();
        assert_eq!(value, "p_printf 4");
        assert_eq!(value.len(), 10);
    }

    #[test]
    fn test_printf_rejects_bad_format() {
        let pool = Pool::new();
        let before = pool.block_count();
        assert!(matches!(
            pool.printf("%q", &[]),
            Err(Error::InvalidDirective('q'))
        ));
        // Nothing was allocated for the rejected format.
        assert_eq!(pool.block_count(), before);
    }

    #[test]
    fn test_join() {
        let pool = Pool::new();
        let value = pool.join('_', &["pool", "join"]);
        assert_eq!(value, "pool_join");
        assert_eq!(value.len(), 9);
    }

    #[test]
    fn test_join_skips_empty_entries() {
        let pool = Pool::new();
        assert_eq!(pool.join('_', &["a", "", "b"]), "a_b");
        assert_eq!(pool.join('_', &["", "x"]), "x");
        assert_eq!(pool.join('_', &[]), "");
    }

    #[test]
    fn test_alloc_slice() {
        let pool = Pool::new();
        let region = pool.alloc_slice(b"bytes");
        assert_eq!(region, b"bytes");
    }

    #[test]
    fn test_registered_buffers() {
        let pool = Pool::with_block_size(64);
        let buf = pool.strbuf(0);
        buf.put_str("registered");
        assert_eq!(buf.fetch(), b"registered");
        assert_eq!(pool.buffer_count(), 1);

        let other = pool.strbuf(8);
        other.put_u8(b'x');
        assert_eq!(pool.buffer_count(), 2);
    }

    /// Source that records how many blocks were drawn from it.
    struct Counting(Rc<Cell<usize>>);

    impl MemorySource for Counting {
        fn reserve(&self, capacity: usize) -> Result<Vec<u8>, Error> {
            self.0.set(self.0.get() + 1);
            SystemSource.reserve(capacity)
        }
    }

    #[test]
    fn test_source_draw_counts() {
        let draws = Rc::new(Cell::new(0));
        let pool = Pool::with_source(Counting(Rc::clone(&draws)), 64);

        pool.alloc(16);
        pool.alloc(16);
        assert_eq!(draws.get(), 1);

        pool.alloc(100);
        assert_eq!(draws.get(), 2);

        drop(pool);
        assert_eq!(draws.get(), 2);
    }

    /// Source that is always out of memory.
    struct Exhausted;

    impl MemorySource for Exhausted {
        fn reserve(&self, capacity: usize) -> Result<Vec<u8>, Error> {
            Err(Error::AllocationFailed(capacity))
        }
    }

    #[test]
    fn test_exhaustion_surfaces() {
        let pool = Pool::with_source(Exhausted, 64);
        assert!(matches!(
            pool.try_alloc(8),
            Err(Error::AllocationFailed(64))
        ));
        assert!(matches!(
            pool.try_alloc(100),
            Err(Error::AllocationFailed(100))
        ));
        assert_eq!(pool.block_count(), 0);
    }
}
