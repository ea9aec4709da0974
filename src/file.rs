//! The open-file table: fixed-size array of `(inumber, offset)` handles,
//! where a handle is the table index (spec.md section 4.4).
//!
//! Mirrors the inode table's shape one level up: a bitmap for allocation, a
//! map-level rwlock held only across existence lookups, and one
//! `Mutex<OpenFileData>` per slot serializing a single handle's own
//! `read`/`write` calls (spec.md section 5's "file-map rwlock → open-file
//! entry mutex" layer of the hierarchy).

use std::sync::{Mutex, RwLock};

use bitflags::bitflags;

use crate::error::{Result, TfsError};
use crate::lock::Bitmap;
use crate::param::MAX_OPEN_FILES;

bitflags! {
    /// Flags accepted by `Filesystem::open` (spec.md section 6).
    pub struct OpenFlags: u32 {
        const CREAT = 0b001;
        const TRUNC = 0b010;
        const APPEND = 0b100;
    }
}

/// A live open-file handle's mutable state: which inode it refers to, and
/// its current read/write cursor.
pub struct OpenFileData {
    pub inumber: usize,
    pub offset: usize,
}

/// One open-file table slot. The mutex is held for the full duration of a
/// `read`/`write` call on this handle, not just the offset update, so two
/// threads sharing the same handle never interleave their I/O (spec.md
/// section 5: "writes to a single file are serialized by the open-file
/// entry lock").
pub struct OpenFileSlot {
    state: Mutex<Option<OpenFileData>>,
}

impl OpenFileSlot {
    fn empty() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

pub struct OpenFileTable {
    bitmap: Bitmap<MAX_OPEN_FILES>,
    existence: RwLock<()>,
    slots: arrayvec::ArrayVec<OpenFileSlot, MAX_OPEN_FILES>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        let mut slots = arrayvec::ArrayVec::new();
        for _ in 0..MAX_OPEN_FILES {
            slots.push(OpenFileSlot::empty());
        }
        Self {
            bitmap: Bitmap::new("open_file_table_bitmap"),
            existence: RwLock::new(()),
            slots,
        }
    }

    fn slot(&self, handle: usize) -> Result<&OpenFileSlot> {
        self.slots
            .get(handle)
            .ok_or(TfsError::InvalidArgument("handle out of range"))
    }

    /// Allocates a handle and publishes its initial `(inumber, offset)`.
    pub fn add(&self, inumber: usize, offset: usize) -> Result<usize> {
        let handle = self
            .bitmap
            .alloc()?
            .ok_or(TfsError::ResourceExhausted("open-file table"))?;
        let _map_guard = self.existence.write()?;
        let mut guard = self.slot(handle)?.state.lock()?;
        *guard = Some(OpenFileData { inumber, offset });
        Ok(handle)
    }

    /// Frees `handle`, dropping its cursor state.
    pub fn remove(&self, handle: usize) -> Result<()> {
        {
            let _map_guard = self.existence.write()?;
            let mut guard = self.slot(handle)?.state.lock()?;
            guard
                .take()
                .ok_or(TfsError::SlotState("handle already closed"))?;
        }
        self.bitmap.free(handle)
    }

    /// Runs `f` with exclusive access to `handle`'s `(inumber, offset)` for
    /// the whole call, matching spec.md's per-handle serialization.
    pub fn with_entry<R>(
        &self,
        handle: usize,
        f: impl FnOnce(&mut OpenFileData) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.slot(handle)?.state.lock()?;
        let data = guard
            .as_mut()
            .ok_or(TfsError::InvalidArgument("handle does not refer to an open file"))?;
        f(data)
    }

    pub fn free_count(&self) -> Result<usize> {
        Ok(MAX_OPEN_FILES - self.bitmap.count_taken()?)
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_frees_the_slot() {
        let table = OpenFileTable::new();
        let free_before = table.free_count().unwrap();
        let handle = table.add(0, 0).unwrap();
        assert_eq!(table.free_count().unwrap(), free_before - 1);
        table.remove(handle).unwrap();
        assert_eq!(table.free_count().unwrap(), free_before);
    }

    #[test]
    fn double_remove_fails() {
        let table = OpenFileTable::new();
        let handle = table.add(0, 0).unwrap();
        table.remove(handle).unwrap();
        assert!(table.remove(handle).is_err());
    }

    #[test]
    fn with_entry_tracks_offset() {
        let table = OpenFileTable::new();
        let handle = table.add(3, 0).unwrap();
        table
            .with_entry(handle, |entry| {
                entry.offset += 5;
                Ok(())
            })
            .unwrap();
        table
            .with_entry(handle, |entry| {
                assert_eq!(entry.inumber, 3);
                assert_eq!(entry.offset, 5);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn exhaustion_returns_resource_exhausted() {
        let table = OpenFileTable::new();
        for _ in 0..MAX_OPEN_FILES {
            table.add(0, 0).unwrap();
        }
        assert_eq!(table.add(0, 0), Err(TfsError::ResourceExhausted("open-file table")));
    }
}
