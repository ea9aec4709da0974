//! Error type returned by every fallible `Filesystem` operation.
//!
//! The source reports failures as a `-1` return plus a tagged
//! `[ tfs_* ] ...` line on stderr/stdout (spec.md section 6). Re-architected
//! as a `Result<T, TfsError>`, matching the `type Error: error::Error`
//! pattern used for file system traits elsewhere in this corpus.

use std::fmt;

/// Everything that can go wrong in a TFS operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TfsError {
    /// Malformed path, out-of-range handle/inumber/block, zero-length
    /// read/write, or an operation attempted on the wrong inode type.
    InvalidArgument(&'static str),

    /// The inode table, data-block store, open-file table, or root
    /// directory has no free slot left.
    ResourceExhausted(&'static str),

    /// `lookup`/`open` without `CREAT` found no matching directory entry.
    NotFound,

    /// A slot that should have been free was not, or vice versa.
    SlotState(&'static str),

    /// A `Mutex`/`RwLock` guarding shared state was poisoned by a panic in
    /// another thread. Treated as fatal for the enclosing operation, as
    /// spec.md section 7 requires for synchronization failures.
    LockPoisoned,

    /// `copy_to_external`'s sink refused or short-wrote.
    ExternalIo(String),
}

impl fmt::Display for TfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TfsError::InvalidArgument(msg) => write!(f, "[ tfs_error ] invalid argument: {msg}"),
            TfsError::ResourceExhausted(what) => write!(f, "[ tfs_error ] {what} exhausted"),
            TfsError::NotFound => write!(f, "[ tfs_error ] no such file"),
            TfsError::SlotState(msg) => write!(f, "[ tfs_error ] slot state violation: {msg}"),
            TfsError::LockPoisoned => write!(f, "[ tfs_error ] lock poisoned"),
            TfsError::ExternalIo(msg) => write!(f, "[ tfs_error ] external i/o: {msg}"),
        }
    }
}

impl std::error::Error for TfsError {}

impl<T> From<std::sync::PoisonError<T>> for TfsError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        TfsError::LockPoisoned
    }
}

pub type Result<T> = std::result::Result<T, TfsError>;
