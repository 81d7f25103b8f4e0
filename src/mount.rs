//! The mount controller: lifecycle (`mount`/`umount`), `info`/`ls`
//! reporting, and the per-file operations that stitch together the root
//! directory, the FAT manager, the handle table, and the I/O engine.
//!
//! There is no process-wide singleton here: `Filesystem` is an explicit
//! session object. `mount` produces one, `umount` consumes it by value,
//! so "operate after unmount" is a type error rather than a runtime
//! check. Tests can mount as many independent filesystems as they like,
//! sequentially or otherwise.

use log::{debug, info as log_info, warn};

use crate::block::BlockDevice;
use crate::config::FsConfig;
use crate::error::{FsError, Result};
use crate::fat::FatTable;
use crate::handle::HandleTable;
use crate::root::{root_block, RootDirectory, RootEntry};
use crate::superblock::Superblock;
use crate::types::{BlockIndex, ROOT_MAX};

pub struct Filesystem<D: BlockDevice> {
    device: D,
    superblock: Superblock,
    fat: FatTable,
    root: RootDirectory,
    handles: HandleTable,
}

/// A file's current size and open-handle count, as reported by [`Filesystem::ls`].
pub struct LsEntry {
    pub name: String,
    pub size: u32,
    /// Raw FAT index, or `0xFFFF` (EOC) for an empty file - matches the
    /// `ls` text format, which always prints a `data_blk` number.
    pub first_block: u16,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Mount `device`: validate the superblock, load the FAT and root
    /// directory into memory, and hand back a session that owns them.
    pub fn mount(device: D) -> Result<Self> {
        let mut sb_buf = vec![0u8; device.block_size() as usize];
        device.read_block(BlockIndex(0), &mut sb_buf)?;
        let superblock = Superblock::decode(&sb_buf)?;

        if u64::from(superblock.total_blocks) != device.block_count() {
            return Err(FsError::BlockCountMismatch {
                superblock: u64::from(superblock.total_blocks),
                device: device.block_count(),
            });
        }
        superblock.check_fat_block_count(device.block_size())?;

        let fat = FatTable::load(&device, &superblock)?;

        let mut root_buf = vec![0u8; device.block_size() as usize];
        device.read_block(root_block(superblock.root_block_index), &mut root_buf)?;
        let root = RootDirectory::load(&root_buf);

        debug!(
            "mounted: {} data blocks, {} fat blocks",
            superblock.data_block_count, superblock.fat_block_count
        );

        Ok(Filesystem {
            device,
            superblock,
            fat,
            root,
            handles: HandleTable::new(),
        })
    }

    /// Flush the superblock, FAT, and root directory to disk and consume
    /// the session. Fails (returning the session back to the caller) if
    /// any handle is still open.
    pub fn umount(self) -> std::result::Result<(), (Self, FsError)> {
        let open = self.handles.open_count();
        if open > 0 {
            warn!("umount rejected: {} handle(s) still open", open);
            return Err((self, FsError::HandleStillOpen(open)));
        }

        if let Err(e) = self.flush() {
            return Err((self, e));
        }
        log_info!("unmounted cleanly");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let sb_buf = self.superblock.encode(self.device.block_size());
        self.device.write_block(BlockIndex(0), &sb_buf)?;
        self.fat.flush(&self.device, &self.superblock)?;
        let root_buf = self.root.encode(self.device.block_size());
        self.device
            .write_block(root_block(self.superblock.root_block_index), &root_buf)?;
        Ok(())
    }

    /// Print the fixed-format `info` summary. `fat_free_ratio`'s numerator
    /// is the count of free entries in `[1, data_block_count)`; entry 0 is
    /// always the reserved end-of-chain sentinel, never free space, so it
    /// is excluded from both the numerator and the denominator's meaning.
    pub fn info(&self) {
        println!("FS Info:");
        println!("total_blk_count={}", self.superblock.total_blocks);
        println!("fat_blk_count={}", self.superblock.fat_block_count);
        println!("rdir_blk={}", self.superblock.root_block_index);
        println!("data_blk={}", self.superblock.data_start_index);
        println!("data_blk_count={}", self.superblock.data_block_count);
        println!(
            "fat_free_ratio={}/{}",
            self.fat.free_count_excluding_zero(),
            self.superblock.data_block_count
        );
        println!("rdir_free_ratio={}/{}", self.root.free_count(), ROOT_MAX);
    }

    /// Create a new, empty file. See [`RootDirectory::create`] for the
    /// exact name/capacity rules.
    pub fn create(&mut self, name: &str) -> Result<()> {
        self.root.create(name)?;
        Ok(())
    }

    /// Delete `name`, freeing its chain. Deleting a file with an open
    /// handle is rejected outright rather than left to leave a dangling
    /// handle behind.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let slot = self.root.lookup(name).ok_or_else(|| FsError::NameNotFound(name.to_string()))?;
        if self.handles.is_open(slot) {
            return Err(FsError::DeleteWhileOpen(name.to_string()));
        }
        let first = self.root.clear(slot);
        self.fat.free_chain(&self.device, &self.superblock, first)?;
        Ok(())
    }

    /// Print the `ls` listing in slot order.
    pub fn ls(&self) {
        println!("FS Ls:");
        for (_, entry) in self.root.enumerate() {
            if let RootEntry::Used { name, size, first_block } = entry {
                let first = first_block.map(|i| i.0).unwrap_or(crate::types::EOC_RAW);
                println!("file: {}, size: {}, data_blk: {}", name, size, first);
            }
        }
    }

    /// Snapshot of the current listing, for callers that want structured
    /// data instead of printed lines.
    pub fn ls_entries(&self) -> Vec<LsEntry> {
        self.root
            .enumerate()
            .filter_map(|(_, e)| match e {
                RootEntry::Used { name, size, first_block } => Some(LsEntry {
                    name: name.clone(),
                    size: *size,
                    first_block: first_block.map(|i| i.0).unwrap_or(crate::types::EOC_RAW),
                }),
                RootEntry::Free => None,
            })
            .collect()
    }

    pub fn open(&mut self, name: &str) -> Result<usize> {
        let slot = self.root.lookup(name).ok_or_else(|| FsError::NameNotFound(name.to_string()))?;
        self.handles.open(slot)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.handles.close(fd)
    }

    fn file_size(&self, slot: usize) -> u32 {
        match self.root.get(slot) {
            RootEntry::Used { size, .. } => *size,
            RootEntry::Free => 0,
        }
    }

    pub fn stat(&self, fd: usize) -> Result<u32> {
        let slot = self.handles.root_slot(fd)?;
        Ok(self.file_size(slot))
    }

    pub fn lseek(&mut self, fd: usize, offset: u64) -> Result<()> {
        let slot = self.handles.root_slot(fd)?;
        let size = u64::from(self.file_size(slot));
        if offset > size {
            return Err(FsError::OffsetOutOfRange { offset, size });
        }
        self.handles.set_offset(fd, offset)
    }

    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<u64> {
        let slot = self.handles.root_slot(fd)?;
        let offset = self.handles.offset(fd)?;
        let (size, first) = match self.root.get(slot) {
            RootEntry::Used { size, first_block, .. } => (u64::from(*size), *first_block),
            RootEntry::Free => return Err(FsError::BadHandle(fd)),
        };
        if offset > size {
            return Err(FsError::OffsetOutOfRange { offset, size });
        }

        let n = crate::io_engine::read(&self.device, &self.superblock, &self.fat, first, size, offset, buf)?;
        self.handles.advance(fd, n)?;
        Ok(n)
    }

    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<u64> {
        let slot = self.handles.root_slot(fd)?;
        let offset = self.handles.offset(fd)?;
        let (size, first) = match self.root.get(slot) {
            RootEntry::Used { size, first_block, .. } => (u64::from(*size), *first_block),
            RootEntry::Free => return Err(FsError::BadHandle(fd)),
        };
        if offset > size {
            return Err(FsError::OffsetOutOfRange { offset, size });
        }

        let (new_first, outcome) = crate::io_engine::write(
            &self.device,
            &self.superblock,
            &mut self.fat,
            first,
            size,
            offset,
            buf,
        )?;
        self.root
            .set_size_and_first_block(slot, outcome.new_size as u32, new_first);
        self.handles.advance(fd, outcome.written)?;
        Ok(outcome.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockDevice;
    use crate::format;

    fn mounted(data_blocks: u16) -> Filesystem<MemoryBlockDevice> {
        let image = format::format_in_memory(data_blocks, FsConfig::default());
        let device = MemoryBlockDevice::from_image(4096, image);
        Filesystem::mount(device).unwrap()
    }

    #[test]
    fn s1_empty_lifecycle() {
        let fs = mounted(8);
        assert!(fs.ls_entries().is_empty());
        fs.umount().map_err(|(_, e)| e).unwrap();
    }

    #[test]
    fn s2_create_delete() {
        let mut fs = mounted(8);
        fs.create("a").unwrap();
        assert!(matches!(fs.create("a"), Err(FsError::NameExists(_))));
        let entries = fs.ls_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].first_block, 0xFFFF);

        fs.delete("a").unwrap();
        assert!(fs.ls_entries().is_empty());
    }

    #[test]
    fn s3_small_write_read() {
        let mut fs = mounted(8);
        fs.create("f").unwrap();
        let fd = fs.open("f").unwrap();
        assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
        assert_eq!(fs.stat(fd).unwrap(), 5);
        fs.lseek(fd, 0).unwrap();
        let mut out = [0u8; 10];
        assert_eq!(fs.read(fd, &mut out).unwrap(), 5);
        assert_eq!(&out[..5], b"hello");
    }

    #[test]
    fn seek_past_end_fails() {
        let mut fs = mounted(8);
        fs.create("f").unwrap();
        let fd = fs.open("f").unwrap();
        fs.write(fd, b"hi").unwrap();
        assert!(matches!(
            fs.lseek(fd, 100),
            Err(FsError::OffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn delete_open_file_is_rejected() {
        let mut fs = mounted(8);
        fs.create("f").unwrap();
        let _fd = fs.open("f").unwrap();
        assert!(fs.delete("f").is_err());
    }

    #[test]
    fn umount_with_open_handle_fails_and_returns_session() {
        let mut fs = mounted(8);
        fs.create("f").unwrap();
        let _fd = fs.open("f").unwrap();
        let (fs, err) = fs.umount().unwrap_err();
        assert!(matches!(err, FsError::HandleStillOpen(1)));
        // session is still usable
        assert_eq!(fs.ls_entries().len(), 1);
    }

    /// Several files coexisting, one deleted along the way: confirms
    /// every survivor's chain length matches its size, no two survivors
    /// share a FAT index, and the free-entry count matches the blocks
    /// actually in use.
    #[test]
    fn multi_file_chains_are_disjoint_and_free_count_is_exact() {
        let mut fs = mounted(16);

        fs.create("a").unwrap();
        let fd_a = fs.open("a").unwrap();
        fs.write(fd_a, &vec![1u8; 3000]).unwrap(); // 1 block
        fs.close(fd_a).unwrap();

        fs.create("b").unwrap();
        let fd_b = fs.open("b").unwrap();
        fs.write(fd_b, &vec![2u8; 9000]).unwrap(); // 3 blocks
        fs.close(fd_b).unwrap();

        fs.create("c").unwrap();
        let fd_c = fs.open("c").unwrap();
        fs.write(fd_c, &vec![3u8; 2 * 4096]).unwrap(); // 2 blocks
        fs.close(fd_c).unwrap();

        // free "b"'s 3 blocks back to the pool.
        fs.delete("b").unwrap();

        fs.create("d").unwrap();
        let fd_d = fs.open("d").unwrap();
        fs.write(fd_d, &vec![4u8; 100]).unwrap(); // 1 block
        fs.close(fd_d).unwrap();

        // Chain integrity + no-aliasing: every survivor's chain length
        // matches its size, and no two survivors share a FAT index.
        let mut seen = std::collections::HashSet::new();
        let mut total_chain_blocks = 0u64;
        for (_, entry) in fs.root.enumerate() {
            if let RootEntry::Used { size, first_block, .. } = entry {
                let chain = fs.fat.chain(*first_block);
                assert_eq!(chain.len() as u64, crate::types::ceil_div(u64::from(*size), 4096));
                for index in &chain {
                    assert!(seen.insert(*index), "FAT index {} reused across files", index);
                }
                total_chain_blocks += chain.len() as u64;
            }
        }
        assert_eq!(total_chain_blocks, 4); // a:1 + c:2 + d:1

        // Free accounting: free entries in [1, data_block_count) equal
        // data_block_count - 1 - (blocks actually in use by survivors).
        let data_block_count = u64::from(fs.superblock.data_block_count);
        assert_eq!(
            fs.fat.free_count_excluding_zero() as u64,
            data_block_count - 1 - total_chain_blocks
        );
    }
}
