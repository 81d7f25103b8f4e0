//! The FAT manager: an in-memory copy of the allocation table, plus
//! find-free/extend/free chain operations. Allocation is always first-fit
//! by ascending FAT index; there is no defragmentation.

use log::{debug, trace};

use crate::block::BlockDevice;
use crate::error::{FsError, Result};
use crate::superblock::Superblock;
use crate::types::{BlockIndex, FatIndex, EOC_RAW};

/// A single FAT entry, decoded out of its raw `u16` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    Eoc,
    Next(FatIndex),
}

impl FatEntry {
    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => FatEntry::Free,
            EOC_RAW => FatEntry::Eoc,
            other => FatEntry::Next(FatIndex(other)),
        }
    }

    fn to_raw(self) -> u16 {
        match self {
            FatEntry::Free => 0,
            FatEntry::Eoc => EOC_RAW,
            FatEntry::Next(i) => i.0,
        }
    }
}

/// The in-memory FAT buffer. Entry 0 is reserved and always `Eoc`; entries
/// `1..data_block_count` describe the data region's chains.
pub struct FatTable {
    entries: Vec<FatEntry>,
}

impl FatTable {
    /// Build a fresh, all-free FAT for `data_block_count` data blocks.
    pub fn new_empty(data_block_count: u16) -> Self {
        let mut entries = vec![FatEntry::Free; data_block_count as usize];
        entries[0] = FatEntry::Eoc;
        FatTable { entries }
    }

    /// Load the FAT from disk: `fat_block_count` consecutive blocks
    /// starting at block 1, packed as little-endian `u16` entries.
    pub fn load<D: BlockDevice>(device: &D, superblock: &Superblock) -> Result<Self> {
        let block_size = device.block_size() as usize;
        let mut raw = vec![0u8; block_size * superblock.fat_block_count as usize];
        for i in 0..superblock.fat_block_count {
            let block = &mut raw[i as usize * block_size..(i as usize + 1) * block_size];
            device.read_block(BlockIndex(1 + u64::from(i)), block)?;
        }

        let len = superblock.data_block_count as usize;
        let mut entries = Vec::with_capacity(len);
        for i in 0..len {
            let raw_entry = u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
            entries.push(FatEntry::from_raw(raw_entry));
        }

        if entries[0] != FatEntry::Eoc {
            return Err(FsError::FatZeroNotEoc);
        }

        Ok(FatTable { entries })
    }

    /// Pack the FAT into the little-endian byte layout it occupies on disk,
    /// zero-padded up to `fat_block_count * block_size` bytes.
    pub fn encode(&self, fat_block_count: u8, block_size: u32) -> Vec<u8> {
        let mut raw = vec![0u8; block_size as usize * fat_block_count as usize];
        for (i, entry) in self.entries.iter().enumerate() {
            let bytes = entry.to_raw().to_le_bytes();
            raw[i * 2] = bytes[0];
            raw[i * 2 + 1] = bytes[1];
        }
        raw
    }

    /// Flush the FAT back to disk across `fat_block_count` blocks starting
    /// at block 1.
    pub fn flush<D: BlockDevice>(&self, device: &D, superblock: &Superblock) -> Result<()> {
        let block_size = device.block_size();
        let raw = self.encode(superblock.fat_block_count, block_size);
        let block_size = block_size as usize;
        for i in 0..superblock.fat_block_count {
            let block = &raw[i as usize * block_size..(i as usize + 1) * block_size];
            device.write_block(BlockIndex(1 + u64::from(i)), block)?;
        }
        Ok(())
    }

    fn len(&self) -> u16 {
        self.entries.len() as u16
    }

    fn get(&self, index: FatIndex) -> FatEntry {
        self.entries[index.0 as usize]
    }

    fn set(&mut self, index: FatIndex, entry: FatEntry) {
        self.entries[index.0 as usize] = entry;
    }

    /// Lowest free FAT index in `[1, data_block_count)`, or `None` if the
    /// disk is full. Index 0 is never returned.
    pub fn find_free(&self) -> Option<FatIndex> {
        (1..self.len()).map(FatIndex).find(|&i| self.get(i) == FatEntry::Free)
    }

    /// Number of free entries in `[1, data_block_count)`, used by `info`'s
    /// `fat_free_ratio` and by the free-accounting invariant. Entry 0 is
    /// always `Eoc`, never literally free, so it's excluded here; nothing
    /// in this crate counts it as free space.
    pub fn free_count_excluding_zero(&self) -> usize {
        self.entries[1..].iter().filter(|e| **e == FatEntry::Free).count()
    }

    /// Follow a chain starting at `start`, returning its FAT indices in
    /// order. Used by invariant checks and by the I/O engine's bounce
    /// buffer sizing.
    pub fn chain(&self, start: Option<FatIndex>) -> Vec<FatIndex> {
        let mut out = Vec::new();
        let mut cur = match start {
            None => return out,
            Some(i) => i,
        };
        loop {
            out.push(cur);
            match self.get(cur) {
                FatEntry::Next(next) => cur = next,
                FatEntry::Eoc => break,
                FatEntry::Free => {
                    // A chain should never run into a free entry; treat it
                    // as an implicit end rather than looping forever.
                    break;
                }
            }
        }
        out
    }

    /// Allocate up to `n` new blocks and append them to the chain whose
    /// current last index is `tail`, or start a fresh chain if `tail` is
    /// `None`. Returns `(first_new_index_if_tail_was_none, allocated_count)`.
    /// Newly allocated blocks are zero-filled on the device before this
    /// function returns, so unwritten tail regions never carry stale data
    /// from whatever previously occupied that block.
    pub fn extend_chain<D: BlockDevice>(
        &mut self,
        device: &D,
        superblock: &Superblock,
        tail: Option<FatIndex>,
        n: u16,
    ) -> Result<(Option<FatIndex>, u16)> {
        let mut tail = tail;
        let mut first_new = None;
        let mut allocated = 0;
        let zero_block = vec![0u8; device.block_size() as usize];

        for _ in 0..n {
            let next = match self.find_free() {
                Some(i) => i,
                None => {
                    debug!("fat: disk full after allocating {} block(s)", allocated);
                    break;
                }
            };
            self.set(next, FatEntry::Eoc);
            device.write_block(superblock.absolute_block(next), &zero_block)?;
            trace!("fat: allocated index {}", next);

            if let Some(t) = tail {
                self.set(t, FatEntry::Next(next));
            } else {
                first_new = Some(next);
            }
            tail = Some(next);
            allocated += 1;
        }

        Ok((first_new, allocated))
    }

    /// Free an entire chain starting at `first`, zero-filling the
    /// corresponding data blocks on disk. A no-op if `first` is `None`
    /// (empty file).
    pub fn free_chain<D: BlockDevice>(
        &mut self,
        device: &D,
        superblock: &Superblock,
        first: Option<FatIndex>,
    ) -> Result<()> {
        let mut cur = match first {
            None => return Ok(()),
            Some(i) => i,
        };
        let zero_block = vec![0u8; device.block_size() as usize];
        loop {
            let next = self.get(cur);
            self.set(cur, FatEntry::Free);
            device.write_block(superblock.absolute_block(cur), &zero_block)?;
            match next {
                FatEntry::Next(n) => cur = n,
                FatEntry::Eoc | FatEntry::Free => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockDevice;

    fn fixture(data_blocks: u16) -> (MemoryBlockDevice, Superblock, FatTable) {
        let sb = Superblock::new(data_blocks, 4096);
        let device = MemoryBlockDevice::new(4096, u64::from(sb.total_blocks));
        let fat = FatTable::new_empty(data_blocks);
        (device, sb, fat)
    }

    #[test]
    fn find_free_skips_reserved_entry_zero() {
        let (_d, _sb, fat) = fixture(4);
        assert_eq!(fat.find_free(), Some(FatIndex(1)));
    }

    #[test]
    fn extend_chain_from_empty_then_again_links_tail() {
        let (device, sb, mut fat) = fixture(8);
        let (first, n) = fat.extend_chain(&device, &sb, None, 2).unwrap();
        assert_eq!(n, 2);
        let first = first.unwrap();
        assert_eq!(fat.chain(Some(first)).len(), 2);

        let tail = *fat.chain(Some(first)).last().unwrap();
        let (should_be_none, n2) = fat.extend_chain(&device, &sb, Some(tail), 1).unwrap();
        assert!(should_be_none.is_none());
        assert_eq!(n2, 1);
        assert_eq!(fat.chain(Some(first)).len(), 3);
    }

    #[test]
    fn extend_chain_stops_when_disk_full() {
        let (device, sb, mut fat) = fixture(3);
        let (first, n) = fat.extend_chain(&device, &sb, None, 5).unwrap();
        assert_eq!(n, 2);
        assert!(first.is_some());
        assert_eq!(fat.find_free(), None);
    }

    #[test]
    fn free_chain_zero_fills_and_marks_free() {
        let (device, sb, mut fat) = fixture(4);
        let (first, _) = fat.extend_chain(&device, &sb, None, 2).unwrap();
        fat.free_chain(&device, &sb, first).unwrap();
        assert_eq!(fat.free_count_excluding_zero(), 3);
    }

    #[test]
    fn free_chain_of_empty_file_is_noop() {
        let (device, sb, mut fat) = fixture(4);
        fat.free_chain(&device, &sb, None).unwrap();
        assert_eq!(fat.free_count_excluding_zero(), 3);
    }
}
