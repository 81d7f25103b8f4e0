//! Mount-time configuration. The on-disk layout rules in spec are fixed;
//! the only thing that varies between deployments is the block size, which
//! this struct carries so tests can exercise small filesystems without the
//! production default of 4096 bytes.

use crate::types::BLOCK_SIZE_DEFAULT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// Block size in bytes, as reported by the backing block device.
    pub block_size: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        FsConfig {
            block_size: BLOCK_SIZE_DEFAULT,
        }
    }
}
