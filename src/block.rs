//! The block device adapter: the seam between this crate's filesystem
//! logic and the outside world. Everything above this module only ever
//! touches whole blocks by index; nothing here knows about files, FAT
//! chains, or directories.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use io_at::{ReadAt, WriteAt};

use crate::types::BlockIndex;

/// Fixed-size block read/write plus a block count, the minimal interface
/// the mount controller needs from a disk. Implemented here for a plain
/// file-backed disk image; other backends (an in-memory `Vec<u8>`, a raw
/// device node) only need to implement this trait to be mountable.
pub trait BlockDevice {
    /// Size of one block in bytes. Constant for the lifetime of the device.
    fn block_size(&self) -> u32;

    /// Total number of blocks on the device.
    fn block_count(&self) -> u64;

    /// Read exactly one block into `buf`. `buf.len()` must equal
    /// `self.block_size()`.
    fn read_block(&self, index: BlockIndex, buf: &mut [u8]) -> io::Result<()>;

    /// Write exactly one block from `buf`. `buf.len()` must equal
    /// `self.block_size()`.
    fn write_block(&self, index: BlockIndex, buf: &[u8]) -> io::Result<()>;
}

/// A disk image backed by an ordinary file, addressed with positional
/// (pread/pwrite-style) I/O so reads and writes never disturb a shared
/// cursor - there isn't one here to disturb.
pub struct FileBlockDevice {
    file: File,
    block_size: u32,
    block_count: u64,
}

impl FileBlockDevice {
    /// Open an existing disk image. `block_count` is derived from the
    /// file's length; it is the mount controller's job to check that
    /// against the superblock's own `total_blocks` field.
    pub fn open<P: AsRef<Path>>(path: P, block_size: u32) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let block_count = len / u64::from(block_size);
        Ok(FileBlockDevice {
            file,
            block_size,
            block_count,
        })
    }

    /// Create a new disk image of exactly `block_count` blocks, all zeroed.
    /// Used by [`crate::format`] to lay down a fresh filesystem.
    pub fn create<P: AsRef<Path>>(path: P, block_size: u32, block_count: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(u64::from(block_size) * block_count)?;
        Ok(FileBlockDevice {
            file,
            block_size,
            block_count,
        })
    }
}

impl BlockDevice for FileBlockDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, index: BlockIndex, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), self.block_size as usize);
        let offset = index.0 * u64::from(self.block_size);
        // ReadAt, like pread(2), is not guaranteed to fill the buffer in one
        // call; loop until it does or it reports EOF/an error.
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read_at(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "short read from block device",
                ));
            }
            filled += n;
        }
        Ok(())
    }

    fn write_block(&self, index: BlockIndex, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), self.block_size as usize);
        let offset = index.0 * u64::from(self.block_size);
        let mut written = 0;
        while written < buf.len() {
            let n = self.file.write_at(&buf[written..], offset + written as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "short write to block device",
                ));
            }
            written += n;
        }
        Ok(())
    }
}

/// An entirely in-memory disk, useful for unit tests that would rather not
/// touch the filesystem.
pub struct MemoryBlockDevice {
    blocks: std::cell::RefCell<Vec<u8>>,
    block_size: u32,
    block_count: u64,
}

impl MemoryBlockDevice {
    pub fn new(block_size: u32, block_count: u64) -> Self {
        MemoryBlockDevice {
            blocks: std::cell::RefCell::new(vec![0u8; block_size as usize * block_count as usize]),
            block_size,
            block_count,
        }
    }

    pub fn from_image(block_size: u32, image: Vec<u8>) -> Self {
        let block_count = image.len() as u64 / u64::from(block_size);
        MemoryBlockDevice {
            blocks: std::cell::RefCell::new(image),
            block_size,
            block_count,
        }
    }

    pub fn into_image(self) -> Vec<u8> {
        self.blocks.into_inner()
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, index: BlockIndex, buf: &mut [u8]) -> io::Result<()> {
        let start = index.0 as usize * self.block_size as usize;
        let blocks = self.blocks.borrow();
        buf.copy_from_slice(&blocks[start..start + self.block_size as usize]);
        Ok(())
    }

    fn write_block(&self, index: BlockIndex, buf: &[u8]) -> io::Result<()> {
        let start = index.0 as usize * self.block_size as usize;
        let mut blocks = self.blocks.borrow_mut();
        blocks[start..start + self.block_size as usize].copy_from_slice(buf);
        Ok(())
    }
}
