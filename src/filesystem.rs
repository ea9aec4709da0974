//! The top-level `Filesystem` handle: wires the inode table, the
//! data-block store, and the open-file table together behind the small
//! POSIX-like surface (spec.md section 4.6).
//!
//! Re-architects the source's module-level global state (`tecnicofs/fs/state.c`'s
//! file-scope arrays) into an owned handle constructed by `new` (the
//! source's `init`) and torn down by `Drop` (the source's `destroy`), so
//! tests can instantiate multiple independent filesystems (spec.md section 9
//! Design Notes, "Global mutable state").

use std::io::Write as _;

use crate::bio::BlockStore;
use crate::error::{Result, TfsError};
use crate::file::{OpenFileTable, OpenFlags};
use crate::fs::{io, path, InodeTable, InodeType};
use crate::param::{EXTERNAL_BUFFER_SIZE, ROOT_DIR_INUM};

/// A best-effort snapshot of free-slot counts across the three tables
/// (the supplemented `tfs_info` accessor — see SPEC_FULL.md section 2).
/// Not atomic across tables: each count is read under its own bitmap lock,
/// released before the next is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    pub free_inodes: usize,
    pub free_blocks: usize,
    pub free_open_files: usize,
}

/// An independent, in-memory filesystem instance.
pub struct Filesystem {
    inodes: InodeTable,
    blocks: BlockStore,
    open_files: OpenFileTable,
}

impl Filesystem {
    /// Creates all tables and the root directory inode at `ROOT_DIR_INUM`.
    /// Fails if that reserved inumber cannot be allocated first (it is
    /// always inode 0 of a freshly created table, so this only fails if
    /// `InodeTable::create` itself fails).
    pub fn new() -> Result<Self> {
        let inodes = InodeTable::new();
        let blocks = BlockStore::new();
        let open_files = OpenFileTable::new();

        let root = inodes.create(InodeType::Directory, &blocks)?;
        if root != ROOT_DIR_INUM {
            return Err(TfsError::InvalidArgument(
                "root directory did not receive the reserved inumber",
            ));
        }

        Ok(Self {
            inodes,
            blocks,
            open_files,
        })
    }

    /// Resolves `path` to an inumber, or `NotFound` if no entry matches.
    pub fn lookup(&self, path_str: &str) -> Result<usize> {
        let name = path::parse_absolute(path_str)?;
        self.inodes
            .find_in_dir(ROOT_DIR_INUM, name, &self.blocks)?
            .ok_or(TfsError::NotFound)
    }

    /// Opens `path` under `flags`, returning a handle.
    ///
    /// On a fresh creation whose open-file-table insert subsequently fails,
    /// the newly created inode and directory entry are left in place — the
    /// source's documented quirk (spec.md section 9), not rolled back here.
    pub fn open(&self, path_str: &str, flags: OpenFlags) -> Result<usize> {
        let name = path::parse_absolute(path_str)?;
        let existing = self.inodes.find_in_dir(ROOT_DIR_INUM, name, &self.blocks)?;

        let inumber = match existing {
            Some(inumber) => {
                if flags.contains(OpenFlags::TRUNC) {
                    self.inodes.write(inumber, |inode| {
                        if let Some(current) = inode.current_block.take() {
                            self.blocks.free(current as usize)?;
                        }
                        inode.size = 0;
                        Ok(())
                    })?;
                }
                inumber
            }
            None => {
                if !flags.contains(OpenFlags::CREAT) {
                    return Err(TfsError::NotFound);
                }
                let inumber = self.inodes.create(InodeType::File, &self.blocks)?;
                let rollback = scopeguard::guard(inumber, |inumber| {
                    let _ = self.inodes.delete(inumber, &self.blocks);
                });
                self.inodes
                    .add_dir_entry(ROOT_DIR_INUM, inumber, name, &self.blocks)?;
                scopeguard::ScopeGuard::into_inner(rollback)
            }
        };

        let offset = if flags.contains(OpenFlags::APPEND) {
            self.inodes.read(inumber, |inode| Ok(inode.size))?
        } else {
            0
        };

        self.open_files.add(inumber, offset)
    }

    pub fn close(&self, handle: usize) -> Result<()> {
        self.open_files.remove(handle)
    }

    /// Writes `buf` at `handle`'s current cursor, advancing it by the
    /// number of bytes actually written (which may be less than
    /// `buf.len()`; see `fs::io::write`).
    pub fn write(&self, handle: usize, buf: &[u8]) -> Result<usize> {
        self.open_files.with_entry(handle, |entry| {
            let written = self
                .inodes
                .write(entry.inumber, |inode| io::write(inode, &self.blocks, buf))?;
            entry.offset += written;
            Ok(written)
        })
    }

    /// Reads up to `buf.len()` bytes starting at `handle`'s current cursor
    /// into `buf`, advancing the cursor by the number of bytes read.
    pub fn read(&self, handle: usize, buf: &mut [u8]) -> Result<usize> {
        self.open_files.with_entry(handle, |entry| {
            let read_bytes = self.inodes.read(entry.inumber, |inode| {
                io::read(inode, &self.blocks, entry.offset, buf)
            })?;
            entry.offset += read_bytes;
            Ok(read_bytes)
        })
    }

    /// Copies the entirety of `src` (opened internally in append mode, then
    /// rewound to offset 0 under locks, matching the source's behavior) to
    /// `dst` in `EXTERNAL_BUFFER_SIZE`-byte chunks.
    pub fn copy_to_external(&self, src: &str, dst: &mut impl std::io::Write) -> Result<()> {
        self.lookup(src)?;
        let handle = self.open(src, OpenFlags::APPEND)?;
        self.open_files.with_entry(handle, |entry| {
            entry.offset = 0;
            Ok(())
        })?;

        let mut chunk = [0u8; EXTERNAL_BUFFER_SIZE];
        loop {
            let read_bytes = self.read(handle, &mut chunk)?;
            if read_bytes == 0 {
                break;
            }
            dst.write_all(&chunk[..read_bytes])
                .map_err(|e| TfsError::ExternalIo(e.to_string()))?;
        }

        self.close(handle)
    }

    /// Snapshot of free-slot counts (see `FsInfo`).
    pub fn info(&self) -> Result<FsInfo> {
        Ok(FsInfo {
            free_inodes: self.inodes.free_count()?,
            free_blocks: self.blocks.free_count()?,
            free_open_files: self.open_files.free_count()?,
        })
    }
}

impl Drop for Filesystem {
    /// Tearing down `Filesystem` drops every table it owns; there is no
    /// backing store to flush (spec.md section 4.6's `destroy`).
    fn drop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_read_back() {
        let fs = Filesystem::new().unwrap();
        let h = fs.open("/a", OpenFlags::CREAT).unwrap();
        assert_eq!(fs.write(h, b"hello").unwrap(), 5);
        fs.close(h).unwrap();

        let h2 = fs.open("/a", OpenFlags::empty()).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(h2, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn open_without_creat_on_missing_path_fails() {
        let fs = Filesystem::new().unwrap();
        assert_eq!(fs.open("/missing", OpenFlags::empty()), Err(TfsError::NotFound));
    }

    #[test]
    fn truncate_resets_size() {
        let fs = Filesystem::new().unwrap();
        let h = fs.open("/t", OpenFlags::CREAT).unwrap();
        fs.write(h, b"abc").unwrap();
        fs.close(h).unwrap();

        let h2 = fs.open("/t", OpenFlags::TRUNC).unwrap();
        // size == 0 after TRUNC, so to_read == 0: `read_error` would be
        // wrong here (spec.md section 4.5 only fails on n == 0, not on
        // available == 0), matching `tecnicofs`'s direct-region reader
        // returning `total_read == 0` rather than -1.
        let mut buf = [0u8; 1];
        assert_eq!(fs.read(h2, &mut buf).unwrap(), 0);
    }

    #[test]
    fn exhaustion_on_overflow_create() {
        // The root directory's single block holds far fewer entries
        // (`crate::fs::MAX_DIR_ENTRIES`) than the inode table has slots
        // (`INODE_TABLE_SIZE`), so creating through the public
        // `open(CREAT)` surface always exhausts the directory first; see
        // DESIGN.md's Open Question resolution.
        let fs = Filesystem::new().unwrap();
        for i in 0..crate::fs::MAX_DIR_ENTRIES {
            fs.open(&format!("/f{i}"), OpenFlags::CREAT).unwrap();
        }
        assert!(fs.open("/overflow", OpenFlags::CREAT).is_err());
    }

    #[test]
    fn copy_to_external_writes_full_contents() {
        let fs = Filesystem::new().unwrap();
        let h = fs.open("/e", OpenFlags::CREAT).unwrap();
        let payload = vec![b'q'; EXTERNAL_BUFFER_SIZE * 3 + 7];
        fs.write(h, &payload).unwrap();
        fs.close(h).unwrap();

        let mut sink = Vec::new();
        fs.copy_to_external("/e", &mut sink).unwrap();
        assert_eq!(sink, payload);
    }
}
