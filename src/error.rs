//! Error taxonomy for every fallible operation in the crate.
//!
//! Each variant corresponds to one precondition violation, capacity
//! exhaustion, or media/format error a caller can hit. Disk-full during
//! `write` is deliberately *not* represented here: it's a partial success
//! (`Ok(n)` with `n` smaller than requested), never an `Err`.

use fmt_extra::AsciiStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// A second `mount` was attempted while a filesystem was already mounted
    /// through the same singleton entry point. Only reachable via
    /// [`crate::ffi`]; the `Filesystem` session API makes this state
    /// unrepresentable by construction.
    #[error("a filesystem is already mounted")]
    AlreadyMounted,

    #[error("no filesystem is mounted")]
    NotMounted,

    #[error("could not open backing disk: {0}")]
    DiskOpen(#[source] std::io::Error),

    #[error("bad superblock signature: {0}")]
    BadSignature(AsciiStr<[u8; 8]>),

    #[error("superblock geometry is internally inconsistent")]
    BadGeometry,

    #[error("superblock total_blocks ({superblock}) does not match device block count ({device})")]
    BlockCountMismatch { superblock: u64, device: u64 },

    #[error("FAT entry 0 is not the end-of-chain sentinel")]
    FatZeroNotEoc,

    #[error("filename is empty")]
    NameEmpty,

    #[error("filename longer than {max} significant bytes", max = crate::types::FILENAME_MAX - 1)]
    NameTooLong,

    #[error("a file named {0:?} already exists")]
    NameExists(String),

    #[error("no file named {0:?}")]
    NameNotFound(String),

    #[error("root directory is full")]
    RootFull,

    #[error("no free file handle")]
    HandlesFull,

    #[error("handle {0} is out of range or not open")]
    BadHandle(usize),

    #[error("offset {offset} is past end of file (size {size})")]
    OffsetOutOfRange { offset: u64, size: u64 },

    #[error("cannot unmount: {0} handle(s) still open")]
    HandleStillOpen(usize),

    #[error("cannot delete {0:?}: file is still open")]
    DeleteWhileOpen(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
