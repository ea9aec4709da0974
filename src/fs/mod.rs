//! Inode table and the root directory it carries.
//!
//! Layers, innermost first: the allocation bitmap (`lock::Bitmap`), the
//! data-block store (`bio::BlockStore`), the inode table (this module), and
//! the addressing/I-O engine (`fs::io`) built on top of it. Directories are
//! not a separate table: the root directory is inode `ROOT_DIR_INUM`,
//! carrying its entries in its own primary data block, exactly as
//! `tecnicofs/fs/state.c` keeps `FS_root` as inode 0 with `add_dir_entry`
//! scanning that inode's `i_block[0]`.

pub mod io;
pub mod path;

use std::sync::RwLock;

use zerocopy::{AsBytes, FromBytes};

use crate::bio::BlockStore;
use crate::error::{Result, TfsError};
use crate::lock::Bitmap;
use crate::param::{BLOCK_SIZE, INODE_TABLE_SIZE, MAX_DIRECT_BLOCKS, MAX_FILE_NAME};

/// `FREE`/`TAKEN` mirrors spec.md's `inumber == NONE` sentinel at the wire
/// level: `-1` marks an empty directory slot.
pub const DIR_ENTRY_FREE: i32 = -1;

/// One slot of the root directory's entry array.
#[repr(C)]
#[derive(Clone, Copy, AsBytes, FromBytes)]
pub struct DirEntry {
    name: [u8; MAX_FILE_NAME],
    inumber: i32,
}

pub const DIR_ENTRY_SIZE: usize = std::mem::size_of::<DirEntry>();
pub const MAX_DIR_ENTRIES: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

impl DirEntry {
    fn free() -> Self {
        Self {
            name: [0; MAX_FILE_NAME],
            inumber: DIR_ENTRY_FREE,
        }
    }

    fn is_free(&self) -> bool {
        self.inumber == DIR_ENTRY_FREE
    }

    fn name_matches(&self, name: &str) -> bool {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..end] == name.as_bytes()
    }

    fn set(&mut self, name: &str, inumber: usize) {
        let bytes = name.as_bytes();
        let n = bytes.len().min(MAX_FILE_NAME - 1);
        self.name = [0; MAX_FILE_NAME];
        self.name[..n].copy_from_slice(&bytes[..n]);
        self.inumber = inumber as i32;
    }
}

/// Reinterprets a directory block's bytes as its entry array, in place.
fn dir_entries_mut(block: &mut [u8; BLOCK_SIZE]) -> &mut [DirEntry] {
    let (entries, _rest) = zerocopy::LayoutVerified::<_, [DirEntry]>::new_slice_from_prefix(
        &mut block[..],
        MAX_DIR_ENTRIES,
    )
    .expect("directory block is large enough for MAX_DIR_ENTRIES entries");
    entries.into_mut_slice()
}

/// Read-only counterpart of `dir_entries_mut`, used by lookups that only
/// hold the owning inode's lock in shared mode.
fn dir_entries(block: &[u8; BLOCK_SIZE]) -> &[DirEntry] {
    let (entries, _rest) =
        zerocopy::LayoutVerified::<_, [DirEntry]>::new_slice_from_prefix(
            &block[..],
            MAX_DIR_ENTRIES,
        )
        .expect("directory block is large enough for MAX_DIR_ENTRIES entries");
    entries.into_slice()
}

fn init_dir_block(block: &mut [u8; BLOCK_SIZE]) {
    for entry in dir_entries_mut(block) {
        *entry = DirEntry::free();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    File,
    Directory,
}

/// The metadata an occupied inode slot carries (spec.md section 3).
#[derive(Clone)]
pub struct InodeData {
    pub kind: InodeType,
    pub size: usize,
    pub direct: [Option<u32>; MAX_DIRECT_BLOCKS],
    pub indirect: Option<u32>,
    /// The block currently being appended to. Doubles, in the source, as
    /// the sole block `inode_delete`/`TRUNC` ever frees (spec.md section 9).
    pub current_block: Option<u32>,
}

impl InodeData {
    fn new(kind: InodeType) -> Self {
        Self {
            kind,
            size: 0,
            direct: [None; MAX_DIRECT_BLOCKS],
            indirect: None,
            current_block: None,
        }
    }
}

/// One inode-table slot: the metadata behind an rwlock. A writer takes it
/// exclusively for the whole region-writer pass of a single `write` call,
/// which fully serializes concurrent writers on the same inode (see
/// DESIGN.md's Open Question resolution on cross-handle write ordering).
pub struct InodeSlot {
    state: RwLock<Option<InodeData>>,
}

impl InodeSlot {
    fn empty() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }
}

pub struct InodeTable {
    /// Doubles as spec.md's "inode table mutex" in the lock hierarchy.
    bitmap: Bitmap<INODE_TABLE_SIZE>,
    /// The map-level lock: held only across existence lookups.
    existence: RwLock<()>,
    slots: arrayvec::ArrayVec<InodeSlot, INODE_TABLE_SIZE>,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut slots = arrayvec::ArrayVec::new();
        for _ in 0..INODE_TABLE_SIZE {
            slots.push(InodeSlot::empty());
        }
        Self {
            bitmap: Bitmap::new("inode_table_bitmap"),
            existence: RwLock::new(()),
            slots,
        }
    }

    fn slot(&self, inumber: usize) -> Result<&InodeSlot> {
        self.slots
            .get(inumber)
            .ok_or(TfsError::InvalidArgument("inumber out of range"))
    }

    /// Allocates an inode. Directories additionally get one data block,
    /// initialized to an all-free entry array.
    pub fn create(&self, kind: InodeType, blocks: &BlockStore) -> Result<usize> {
        let inumber = self
            .bitmap
            .alloc()?
            .ok_or(TfsError::ResourceExhausted("inode table"))?;

        let inumber_guard = scopeguard::guard(inumber, |inumber| {
            let _ = self.bitmap.free(inumber);
        });

        let mut data = InodeData::new(kind);
        if kind == InodeType::Directory {
            let block_index = blocks.alloc()?;
            // SAFETY: `block_index` was just allocated; nothing else can
            // reach it until we publish `inumber` below.
            let block = unsafe { blocks.get(block_index)? };
            init_dir_block(block);
            data.direct[0] = Some(block_index as u32);
            data.current_block = Some(block_index as u32);
            data.size = BLOCK_SIZE;
        }
        let inumber = scopeguard::ScopeGuard::into_inner(inumber_guard);

        let _map_guard = self.existence.write()?;
        let mut guard = self.slot(inumber)?.state.write()?;
        *guard = Some(data);
        Ok(inumber)
    }

    /// Frees the inode's primary (current) data block if one is set, and
    /// marks the inode slot free. Does not walk the indirect region or the
    /// other direct blocks — see spec.md section 9's documented quirk.
    pub fn delete(&self, inumber: usize, blocks: &BlockStore) -> Result<()> {
        let current_block = {
            let _map_guard = self.existence.write()?;
            let mut guard = self.slot(inumber)?.state.write()?;
            let data = guard
                .take()
                .ok_or(TfsError::SlotState("inode already free"))?;
            data.current_block
        };
        if let Some(block_index) = current_block {
            blocks.free(block_index as usize)?;
        }
        self.bitmap.free(inumber)
    }

    pub fn read<R>(&self, inumber: usize, f: impl FnOnce(&InodeData) -> Result<R>) -> Result<R> {
        let guard = self.slot(inumber)?.state.read()?;
        let data = guard.as_ref().ok_or(TfsError::InvalidArgument(
            "inumber does not refer to a live inode",
        ))?;
        f(data)
    }

    pub fn write<R>(
        &self,
        inumber: usize,
        f: impl FnOnce(&mut InodeData) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.slot(inumber)?.state.write()?;
        let data = guard.as_mut().ok_or(TfsError::InvalidArgument(
            "inumber does not refer to a live inode",
        ))?;
        f(data)
    }

    /// Finds the first free directory-entry slot in `dir_inumber`'s primary
    /// block and fills it. Fails if the inode is not a directory, the
    /// directory is full, or `name` is empty.
    pub fn add_dir_entry(
        &self,
        dir_inumber: usize,
        child_inumber: usize,
        name: &str,
        blocks: &BlockStore,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(TfsError::InvalidArgument("directory entry name is empty"));
        }
        self.write(dir_inumber, |dir| {
            if dir.kind != InodeType::Directory {
                return Err(TfsError::InvalidArgument("not a directory"));
            }
            let block_index = dir
                .direct[0]
                .ok_or(TfsError::InvalidArgument("directory has no primary block"))?;
            // SAFETY: we hold `dir`'s write lock (via `self.write` above).
            let block = unsafe { blocks.get(block_index as usize)? };
            let entries = dir_entries_mut(block);
            let slot = entries
                .iter_mut()
                .find(|e| e.is_free())
                .ok_or(TfsError::ResourceExhausted("directory"))?;
            slot.set(name, child_inumber);
            Ok(())
        })
    }

    /// Linear scan for the first entry whose name matches; `None` if absent.
    pub fn find_in_dir(
        &self,
        dir_inumber: usize,
        name: &str,
        blocks: &BlockStore,
    ) -> Result<Option<usize>> {
        self.read(dir_inumber, |dir| {
            if dir.kind != InodeType::Directory {
                return Err(TfsError::InvalidArgument("not a directory"));
            }
            let block_index = dir
                .direct[0]
                .ok_or(TfsError::InvalidArgument("directory has no primary block"))?;
            // SAFETY: we hold `dir`'s read lock (via `self.read` above).
            let block = unsafe { blocks.get_shared(block_index as usize)? };
            let entries = dir_entries(block);
            Ok(entries
                .iter()
                .find(|e| !e.is_free() && e.name_matches(name))
                .map(|e| e.inumber as usize))
        })
    }

    pub fn free_count(&self) -> Result<usize> {
        Ok(INODE_TABLE_SIZE - self.bitmap.count_taken()?)
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
