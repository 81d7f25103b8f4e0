/**
 * A small, educational FAT-style filesystem living inside a single
 * fixed-size virtual disk image.
 *
 * The disk is a flat sequence of equal-size blocks:
 *
 *   block 0             superblock
 *   blocks 1..=N         file allocation table (FAT)
 *   block N+1            root directory
 *   blocks N+2..          data region
 *
 * The FAT is an array of 16-bit entries, one per data block, used as
 * "next pointers" to link a file's data blocks into a singly-linked
 * chain terminated by the end-of-chain sentinel `0xFFFF`. Entry 0 is
 * reserved and always holds that sentinel.
 *
 * The root directory is a single block holding up to 128 named file
 * entries - no subdirectories, no permissions, no timestamps.
 *
 * Everything above the block device is owned by this crate; the device
 * itself (open/close, block count, fixed-size block read/write) is the
 * one seam callers plug their own storage backend into, through the
 * `BlockDevice` trait.
 */

pub mod block;
pub mod config;
pub mod error;
pub mod fat;
pub mod ffi;
pub mod format;
pub mod handle;
pub mod io_engine;
pub mod mount;
pub mod root;
pub mod superblock;
pub mod types;

pub use block::{BlockDevice, FileBlockDevice, MemoryBlockDevice};
pub use config::FsConfig;
pub use error::{FsError, Result};
pub use mount::{Filesystem, LsEntry};
