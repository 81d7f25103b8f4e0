//! The superblock: signature, geometry, and the block-0 codec.

use index_fixed::index_fixed;

use crate::error::{FsError, Result};
use crate::types::{BlockIndex, FatIndex, SIGNATURE, SUPERBLOCK_HEADER_LEN};

/// Block 0's parsed contents: signature, total block count, and the
/// geometry of the FAT/root/data regions. Only the meaningful header
/// fields are stored here; the rest of the block is zero padding
/// recreated on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub total_blocks: u16,
    pub root_block_index: u16,
    pub data_start_index: u16,
    pub data_block_count: u16,
    pub fat_block_count: u8,
}

impl Superblock {
    /// Derive a fresh, internally-consistent superblock for a filesystem
    /// with `data_block_count` data blocks and the given `block_size`.
    /// Used by [`crate::format`].
    pub fn new(data_block_count: u16, block_size: u32) -> Self {
        let fat_block_count =
            crate::types::ceil_div(u64::from(data_block_count) * 2, u64::from(block_size)) as u8;
        let root_block_index = 1 + u16::from(fat_block_count);
        let data_start_index = root_block_index + 1;
        let total_blocks = 1 + u16::from(fat_block_count) + 1 + data_block_count;
        Superblock {
            total_blocks,
            root_block_index,
            data_start_index,
            data_block_count,
            fat_block_count,
        }
    }

    /// Decode a superblock from a raw block-0 buffer, validating signature
    /// and internal geometry invariants but *not* the device's reported
    /// block count - the caller does that, since only it knows the device.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let signature: &[u8; 8] = index_fixed!(buf; 0, ..8);
        if signature != SIGNATURE {
            return Err(FsError::BadSignature(fmt_extra::AsciiStr(*signature)));
        }

        let total_blocks = u16::from_le_bytes(*index_fixed!(buf; 8, ..10));
        let root_block_index = u16::from_le_bytes(*index_fixed!(buf; 10, ..12));
        let data_start_index = u16::from_le_bytes(*index_fixed!(buf; 12, ..14));
        let data_block_count = u16::from_le_bytes(*index_fixed!(buf; 14, ..16));
        let fat_block_count = buf[16];

        let sb = Superblock {
            total_blocks,
            root_block_index,
            data_start_index,
            data_block_count,
            fat_block_count,
        };
        sb.check_geometry()?;
        Ok(sb)
    }

    fn check_geometry(&self) -> Result<()> {
        let expected_total =
            1u32 + u32::from(self.fat_block_count) + 1 + u32::from(self.data_block_count);
        let expected_root = 1 + u16::from(self.fat_block_count);
        let expected_data_start = expected_root + 1;
        if u32::from(self.total_blocks) != expected_total
            || self.root_block_index != expected_root
            || self.data_start_index != expected_data_start
        {
            return Err(FsError::BadGeometry);
        }
        Ok(())
    }

    /// Serialize this superblock into a zero-padded block-sized buffer.
    pub fn encode(&self, block_size: u32) -> Vec<u8> {
        let mut buf = vec![0u8; block_size as usize];
        buf[0..8].copy_from_slice(SIGNATURE);
        buf[8..10].copy_from_slice(&self.total_blocks.to_le_bytes());
        buf[10..12].copy_from_slice(&self.root_block_index.to_le_bytes());
        buf[12..14].copy_from_slice(&self.data_start_index.to_le_bytes());
        buf[14..16].copy_from_slice(&self.data_block_count.to_le_bytes());
        buf[16] = self.fat_block_count;
        // [17..block_size) left zeroed, matching SUPERBLOCK_HEADER_LEN.
        debug_assert!(SUPERBLOCK_HEADER_LEN <= block_size as usize);
        buf
    }

    /// Check the one geometry invariant that depends on block size, which
    /// isn't itself stored on disk: `fat_block_count == ceil(data_block_count
    /// * 2 / block_size)`. Called by the mount controller once it knows the
    /// device's block size.
    pub fn check_fat_block_count(&self, block_size: u32) -> Result<()> {
        let expected =
            crate::types::ceil_div(u64::from(self.data_block_count) * 2, u64::from(block_size));
        if u64::from(self.fat_block_count) != expected {
            return Err(FsError::BadGeometry);
        }
        Ok(())
    }

    /// Map a FAT index to the absolute block number that holds its data.
    pub fn absolute_block(&self, index: FatIndex) -> BlockIndex {
        BlockIndex(u64::from(self.data_start_index) + u64::from(index.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_then_decode_round_trips() {
        let sb = Superblock::new(8, 4096);
        let buf = sb.encode(4096);
        let decoded = Superblock::decode(&buf).unwrap();
        assert_eq!(sb, decoded);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let buf = vec![0u8; 4096];
        assert!(matches!(
            Superblock::decode(&buf),
            Err(FsError::BadSignature(_))
        ));
    }

    #[test]
    fn geometry_invariants_hold() {
        let sb = Superblock::new(1000, 4096);
        assert_eq!(sb.root_block_index, 1 + u16::from(sb.fat_block_count));
        assert_eq!(sb.data_start_index, sb.root_block_index + 1);
        assert_eq!(
            u32::from(sb.total_blocks),
            1 + u32::from(sb.fat_block_count) + 1 + u32::from(sb.data_block_count)
        );
    }
}
