//! Addressing & I/O engine: maps a `(file, offset, length)` triple onto a
//! sequence of block reads/writes spanning the direct region (the first
//! `MAX_DIRECT_BLOCKS` blocks) and, beyond that, the indirect region
//! indexed through one indirection block.
//!
//! Split into a direct-region and an indirect-region writer/reader, the
//! same shape as the source's `tfs_write_direct_region` /
//! `tfs_write_indirect_region` pair — needed because the straddling case
//! (spec.md section 4.5 step 4) calls each independently.

use crate::bio::BlockStore;
use crate::error::{Result, TfsError};
use crate::fs::{InodeData, InodeType};
use crate::param::{BLOCK_SIZE, INDEX_BLOCK_ENTRIES, MAX_DIRECT_BLOCKS, MAX_FILE_BYTES};

const DIRECT_REGION_BYTES: usize = MAX_DIRECT_BLOCKS * BLOCK_SIZE;

/// Reinterprets an indirect block's bytes as the array of block indices it
/// carries once `inode.indirect` is set. Free slots hold `-1`.
fn index_entries_mut(block: &mut [u8; BLOCK_SIZE]) -> &mut [i32] {
    let (entries, _rest) = zerocopy::LayoutVerified::<_, [i32]>::new_slice_from_prefix(
        &mut block[..],
        INDEX_BLOCK_ENTRIES,
    )
    .expect("block is large enough for INDEX_BLOCK_ENTRIES i32 slots");
    entries.into_mut_slice()
}

fn index_entries(block: &[u8; BLOCK_SIZE]) -> &[i32] {
    let (entries, _rest) = zerocopy::LayoutVerified::<_, [i32]>::new_slice_from_prefix(
        &block[..],
        INDEX_BLOCK_ENTRIES,
    )
    .expect("block is large enough for INDEX_BLOCK_ENTRIES i32 slots");
    entries.into_slice()
}

/// Allocates the indirect index block, if the inode doesn't have one yet,
/// and initializes every slot to the free sentinel.
fn ensure_indirect_block(inode: &mut InodeData, blocks: &BlockStore) -> Result<u32> {
    if let Some(index) = inode.indirect {
        return Ok(index);
    }
    let block_index = blocks.alloc()?;
    // SAFETY: just allocated, not yet reachable from any other inode.
    let block = unsafe { blocks.get(block_index)? };
    for slot in index_entries_mut(block) {
        *slot = -1;
    }
    inode.indirect = Some(block_index as u32);
    Ok(block_index as u32)
}

/// Appends `buf` to `inode`, growing `size`. Returns the number of bytes
/// actually written, which may be less than `buf.len()` if `MAX_FILE_BYTES`
/// is reached. Caller must hold the inode's write lock.
pub fn write(inode: &mut InodeData, blocks: &BlockStore, buf: &[u8]) -> Result<usize> {
    if inode.kind != InodeType::File {
        return Err(TfsError::InvalidArgument("cannot write to a directory"));
    }
    if buf.is_empty() {
        return Err(TfsError::InvalidArgument("nothing to write"));
    }

    let capacity = MAX_FILE_BYTES.saturating_sub(inode.size);
    let to_write = buf.len().min(capacity);
    if to_write == 0 {
        return Ok(0);
    }
    let buf = &buf[..to_write];

    let mut total = 0;
    if inode.size < DIRECT_REGION_BYTES {
        let direct_amount = (DIRECT_REGION_BYTES - inode.size).min(buf.len());
        total += write_direct_region(inode, blocks, &buf[..direct_amount])?;
        if total < buf.len() {
            ensure_indirect_block(inode, blocks)?;
            total += write_indirect_region(inode, blocks, &buf[total..])?;
        }
    } else {
        ensure_indirect_block(inode, blocks)?;
        total += write_indirect_region(inode, blocks, buf)?;
    }
    Ok(total)
}

fn write_direct_region(inode: &mut InodeData, blocks: &BlockStore, buf: &[u8]) -> Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        let offset_in_block = inode.size % BLOCK_SIZE;
        let logical = inode.size / BLOCK_SIZE;
        if offset_in_block == 0 {
            let new_block = blocks.alloc()?;
            inode.direct[logical] = Some(new_block as u32);
            inode.current_block = Some(new_block as u32);
        }
        let block_index = inode.direct[logical]
            .ok_or(TfsError::InvalidArgument("write_error: missing direct block"))?;
        // SAFETY: caller holds the inode's write lock.
        let block = unsafe { blocks.get(block_index as usize)? };
        let space = BLOCK_SIZE - offset_in_block;
        let take = space.min(buf.len() - written);
        block[offset_in_block..offset_in_block + take]
            .copy_from_slice(&buf[written..written + take]);
        inode.size += take;
        written += take;
    }
    Ok(written)
}

fn write_indirect_region(inode: &mut InodeData, blocks: &BlockStore, buf: &[u8]) -> Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        let rel = inode.size - DIRECT_REGION_BYTES;
        let offset_in_block = rel % BLOCK_SIZE;
        let logical = rel / BLOCK_SIZE;
        let indirect_block_index = inode
            .indirect
            .ok_or(TfsError::InvalidArgument("write_error: missing indirect block"))?;

        if offset_in_block == 0 {
            let new_block = blocks.alloc()?;
            // SAFETY: caller holds the inode's write lock.
            let index_block = unsafe { blocks.get(indirect_block_index as usize)? };
            index_entries_mut(index_block)[logical] = new_block as i32;
            inode.current_block = Some(new_block as u32);
        }

        // SAFETY: caller holds the inode's write lock.
        let index_block = unsafe { blocks.get(indirect_block_index as usize)? };
        let data_block_index = index_entries_mut(index_block)[logical];
        if data_block_index < 0 {
            return Err(TfsError::InvalidArgument(
                "write_error: missing indirect data block",
            ));
        }
        // SAFETY: caller holds the inode's write lock.
        let block = unsafe { blocks.get(data_block_index as usize)? };
        let space = BLOCK_SIZE - offset_in_block;
        let take = space.min(buf.len() - written);
        block[offset_in_block..offset_in_block + take]
            .copy_from_slice(&buf[written..written + take]);
        inode.size += take;
        written += take;
    }
    Ok(written)
}

/// Copies up to `buf.len()` bytes starting at `offset` into `buf`. Returns
/// the number of bytes actually copied, bounded by `inode.size - offset`.
/// Caller must hold the inode's read (or write) lock.
pub fn read(inode: &InodeData, blocks: &BlockStore, offset: usize, buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(TfsError::InvalidArgument("nothing to read"));
    }
    let available = inode.size.saturating_sub(offset);
    let to_read = buf.len().min(available);
    if to_read == 0 {
        return Ok(0);
    }

    let mut total = 0;
    let mut pos = offset;
    while total < to_read {
        let block_index = resolve_block(inode, blocks, pos)?;
        let offset_in_block = pos % BLOCK_SIZE;
        // SAFETY: caller holds the inode's lock in at least read mode.
        let block = unsafe { blocks.get_shared(block_index)? };
        let space = BLOCK_SIZE - offset_in_block;
        let take = space.min(to_read - total);
        buf[total..total + take].copy_from_slice(&block[offset_in_block..offset_in_block + take]);
        total += take;
        pos += take;
    }
    Ok(total)
}

fn resolve_block(inode: &InodeData, blocks: &BlockStore, pos: usize) -> Result<usize> {
    if pos < DIRECT_REGION_BYTES {
        let logical = pos / BLOCK_SIZE;
        inode.direct[logical]
            .map(|b| b as usize)
            .ok_or(TfsError::InvalidArgument("read_error: missing direct block"))
    } else {
        let indirect_block_index = inode
            .indirect
            .ok_or(TfsError::InvalidArgument("read_error: missing indirect block"))?;
        let logical = (pos - DIRECT_REGION_BYTES) / BLOCK_SIZE;
        // SAFETY: caller holds the inode's lock in at least read mode.
        let index_block = unsafe { blocks.get_shared(indirect_block_index as usize)? };
        let data_block_index = index_entries(index_block)[logical];
        if data_block_index < 0 {
            return Err(TfsError::InvalidArgument(
                "read_error: missing indirect data block",
            ));
        }
        Ok(data_block_index as usize)
    }
}
