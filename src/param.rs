//! Compile-time configuration constants.
//!
//! These values are part of the contract: tests and callers may depend on
//! their exact numbers, not just their meaning.

/// Size in bytes of a single data block.
pub const BLOCK_SIZE: usize = 1024;

/// Number of data blocks in the data-block store.
pub const DATA_BLOCKS: usize = 1024;

/// Number of slots in the inode table.
pub const INODE_TABLE_SIZE: usize = 50;

/// Number of slots in the open-file table.
pub const MAX_OPEN_FILES: usize = 20;

/// Maximum length of a file name, including the terminator.
pub const MAX_FILE_NAME: usize = 40;

/// Number of direct block slots per inode.
pub const MAX_DIRECT_BLOCKS: usize = 10;

/// Size in bytes of one block index, as stored inside an indirect block.
pub const INDEX_SIZE: usize = 4;

/// Number of block-index slots in one indirect (index) block.
pub const INDEX_BLOCK_ENTRIES: usize = BLOCK_SIZE / INDEX_SIZE;

/// Iteration count of the latency-simulating busy-wait loop.
pub const DELAY: u32 = 5000;

/// Fixed inumber of the root directory.
pub const ROOT_DIR_INUM: usize = 0;

/// Chunk size `copy_to_external` reads/writes at a time.
pub const EXTERNAL_BUFFER_SIZE: usize = 100;

/// Largest byte count a single file may hold.
pub const MAX_FILE_BYTES: usize =
    MAX_DIRECT_BLOCKS * BLOCK_SIZE + INDEX_BLOCK_ENTRIES * BLOCK_SIZE;

static_assertions::const_assert_eq!(MAX_FILE_BYTES, 272_384);
