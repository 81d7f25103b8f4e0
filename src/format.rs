//! A minimal formatter producing a valid, mountable, empty filesystem
//! image. This is test/fixture tooling for this crate's own test suite,
//! not a shipped end-user formatting CLI.

use std::io;
use std::path::Path;

use crate::block::{BlockDevice, FileBlockDevice};
use crate::config::FsConfig;
use crate::fat::FatTable;
use crate::root::RootDirectory;
use crate::superblock::Superblock;

/// Build a complete disk image (superblock + empty FAT + empty root +
/// zeroed data region) for `data_block_count` data blocks under `config`,
/// entirely in memory.
pub fn format_in_memory(data_block_count: u16, config: FsConfig) -> Vec<u8> {
    let block_size = config.block_size;
    let superblock = Superblock::new(data_block_count, block_size);
    let fat = FatTable::new_empty(data_block_count);
    let root = RootDirectory::new_empty();

    let mut image = vec![0u8; u64::from(superblock.total_blocks) as usize * block_size as usize];
    let put = |image: &mut Vec<u8>, block: u16, data: &[u8]| {
        let start = block as usize * block_size as usize;
        image[start..start + data.len()].copy_from_slice(data);
    };

    put(&mut image, 0, &superblock.encode(block_size));
    put(
        &mut image,
        1,
        &fat.encode(superblock.fat_block_count, block_size),
    );
    put(&mut image, superblock.root_block_index, &root.encode(block_size));
    image
}

/// Create a fresh disk image file at `path` and format it, returning an
/// open device ready to mount.
pub fn format_file<P: AsRef<Path>>(
    path: P,
    data_block_count: u16,
    config: FsConfig,
) -> io::Result<FileBlockDevice> {
    let block_size = config.block_size;
    let superblock = Superblock::new(data_block_count, block_size);
    let device = FileBlockDevice::create(path, block_size, u64::from(superblock.total_blocks))?;

    let sb_buf = superblock.encode(block_size);
    device.write_block(crate::types::BlockIndex(0), &sb_buf)?;

    let fat = FatTable::new_empty(data_block_count);
    fat.flush(&device, &superblock)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let root = RootDirectory::new_empty();
    device.write_block(
        crate::types::BlockIndex(u64::from(superblock.root_block_index)),
        &root.encode(block_size),
    )?;

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDevice, MemoryBlockDevice};
    use crate::mount::Filesystem;

    #[test]
    fn formatted_image_mounts_cleanly() {
        let image = format_in_memory(8, FsConfig::default());
        let device = MemoryBlockDevice::from_image(4096, image);
        let fs = Filesystem::mount(device).unwrap();
        assert!(fs.ls_entries().is_empty());
    }
}
