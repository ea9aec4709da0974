//! The data-block store: a contiguous array of fixed-size blocks, addressed
//! by block index.
//!
//! Mirrors `tecnicofs/fs/state.c`'s `data_block_alloc`/`data_block_get`: the
//! bitmap's mutex serializes allocation and deallocation, but reading or
//! writing the bytes of an already-allocated block takes no lock of its
//! own — callers serialize content access through the owning inode's lock
//! (spec.md section 4.2).

use std::cell::UnsafeCell;

use crate::error::{Result, TfsError};
use crate::lock::{simulate_latency, Bitmap};
use crate::param::{BLOCK_SIZE, DATA_BLOCKS};

/// One `BLOCK_SIZE`-byte block. Interpretation (raw bytes, directory
/// entries, or an index array) depends on whichever inode field points at
/// it.
///
/// `align(4)` so a block can be reinterpreted in place as an array of
/// `i32` block indices (the indirect region) or as an array of `DirEntry`
/// records without an unaligned-read penalty, the same trick the teacher's
/// `BufData` uses to let disk blocks double as `u32` arrays.
#[repr(align(4))]
pub struct BlockBytes(pub [u8; BLOCK_SIZE]);

impl std::ops::Deref for BlockBytes {
    type Target = [u8; BLOCK_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for BlockBytes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub struct BlockStore {
    bitmap: Bitmap<DATA_BLOCKS>,
    blocks: Vec<UnsafeCell<BlockBytes>>,
}

// SAFETY: `blocks` is only ever accessed through `get`, which documents that
// the caller must hold the owning inode's lock for the duration of the
// access. That lock is what actually serializes concurrent access to a
// given block's bytes; `BlockStore` itself never reads or writes into a
// block.
unsafe impl Sync for BlockStore {}

impl BlockStore {
    pub fn new() -> Self {
        let mut blocks = Vec::with_capacity(DATA_BLOCKS);
        blocks.resize_with(DATA_BLOCKS, || UnsafeCell::new(BlockBytes([0u8; BLOCK_SIZE])));
        Self {
            bitmap: Bitmap::new("data_block_bitmap"),
            blocks,
        }
    }

    /// Allocates the lowest-indexed free block. Does not clear its bytes;
    /// callers that need a zeroed block clear it themselves after `get`.
    pub fn alloc(&self) -> Result<usize> {
        self.bitmap
            .alloc()?
            .ok_or(TfsError::ResourceExhausted("data-block store"))
    }

    pub fn free(&self, index: usize) -> Result<()> {
        self.bitmap.free(index)
    }

    /// Returns a mutable view of block `index`'s bytes.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock of the inode that owns this block
    /// (its entity rwlock, in write mode for a writer or read mode for a
    /// reader) for as long as the returned reference is alive. `BlockStore`
    /// performs no locking of its own here.
    pub unsafe fn get(&self, index: usize) -> Result<&mut BlockBytes> {
        simulate_latency();
        let cell = self
            .blocks
            .get(index)
            .ok_or(TfsError::InvalidArgument("block index out of range"))?;
        Ok(&mut *cell.get())
    }

    /// Returns a shared view of block `index`'s bytes.
    ///
    /// # Safety
    ///
    /// The caller must hold the owning inode's lock in read (shared) mode,
    /// and no concurrent caller may hold it in write mode, for as long as
    /// the returned reference is alive.
    pub unsafe fn get_shared(&self, index: usize) -> Result<&BlockBytes> {
        simulate_latency();
        let cell = self
            .blocks
            .get(index)
            .ok_or(TfsError::InvalidArgument("block index out of range"))?;
        Ok(&*cell.get())
    }

    pub fn free_count(&self) -> Result<usize> {
        Ok(DATA_BLOCKS - self.bitmap.count_taken()?)
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_lowest_free_index() {
        let store = BlockStore::new();
        assert_eq!(store.alloc().unwrap(), 0);
        assert_eq!(store.alloc().unwrap(), 1);
        store.free(0).unwrap();
        assert_eq!(store.alloc().unwrap(), 0);
    }

    #[test]
    fn get_out_of_range_fails() {
        let store = BlockStore::new();
        assert!(unsafe { store.get(DATA_BLOCKS) }.is_err());
    }

    #[test]
    fn exhaustion_returns_resource_exhausted() {
        let store = BlockStore::new();
        for _ in 0..DATA_BLOCKS {
            store.alloc().unwrap();
        }
        assert_eq!(
            store.alloc(),
            Err(TfsError::ResourceExhausted("data-block store"))
        );
    }
}
