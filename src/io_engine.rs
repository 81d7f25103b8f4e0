//! Read and write byte ranges over a file's FAT chain, using a bounce
//! buffer scoped to each call. This sacrifices I/O minimalism (every call
//! reads or writes the entire chain) for straightforward correctness at
//! both partial-block endpoints and newly-extended tails.

use crate::block::BlockDevice;
use crate::error::Result;
use crate::fat::FatTable;
use crate::superblock::Superblock;
use crate::types::{ceil_div, FatIndex};

/// Read the full chain starting at `first` into one contiguous buffer of
/// `chain_len * block_size` bytes.
fn read_chain<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    fat: &FatTable,
    first: Option<FatIndex>,
) -> Result<Vec<u8>> {
    let block_size = device.block_size() as usize;
    let chain = fat.chain(first);
    let mut buf = vec![0u8; chain.len() * block_size];
    for (i, index) in chain.iter().enumerate() {
        let block = &mut buf[i * block_size..(i + 1) * block_size];
        device.read_block(superblock.absolute_block(*index), block)?;
    }
    Ok(buf)
}

/// Write `buf` back out along `first`'s chain, one block at a time. `buf`'s
/// length must be an exact multiple of the block size and match the
/// chain's length.
fn write_chain<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    fat: &FatTable,
    first: Option<FatIndex>,
    buf: &[u8],
) -> Result<()> {
    let block_size = device.block_size() as usize;
    let chain = fat.chain(first);
    debug_assert_eq!(buf.len(), chain.len() * block_size);
    for (i, index) in chain.iter().enumerate() {
        let block = &buf[i * block_size..(i + 1) * block_size];
        device.write_block(superblock.absolute_block(*index), block)?;
    }
    Ok(())
}

/// Read up to `n` bytes starting at `offset` out of a file of `file_size`
/// bytes and chain head `first`. `offset <= file_size` is the caller's
/// responsibility (checked one level up, where the handle lives). Returns
/// the number of bytes actually copied into `out` (`out.len() >= n`
/// expected; only the first return value's worth of bytes are written).
pub fn read<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    fat: &FatTable,
    first: Option<FatIndex>,
    file_size: u64,
    offset: u64,
    out: &mut [u8],
) -> Result<u64> {
    if first.is_none() {
        return Ok(0);
    }
    let n = (out.len() as u64).min(file_size.saturating_sub(offset));
    if n == 0 {
        return Ok(0);
    }
    let buf = read_chain(device, superblock, fat, first)?;
    let start = offset as usize;
    out[..n as usize].copy_from_slice(&buf[start..start + n as usize]);
    Ok(n)
}

/// Outcome of a write: the (possibly clamped) byte count actually spliced
/// in, and the file's new size.
pub struct WriteOutcome {
    pub written: u64,
    pub new_size: u64,
}

/// Write `src` (up to `n_requested = src.len()` bytes) at `offset` into a
/// file of `file_size` bytes and chain head `first`, extending the chain
/// as needed. `offset <= file_size` is the caller's responsibility.
/// Returns the new chain head (unchanged unless the file grew from empty)
/// and a [`WriteOutcome`] describing what actually happened; the FAT and
/// root metadata updates implied by a chain extension are already applied
/// to `fat` by the time this returns, the caller only needs to persist the
/// returned size/first-block pair into the root entry.
pub fn write<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    fat: &mut FatTable,
    first: Option<FatIndex>,
    file_size: u64,
    offset: u64,
    src: &[u8],
) -> Result<(Option<FatIndex>, WriteOutcome)> {
    let block_size = u64::from(device.block_size());
    if src.is_empty() {
        return Ok((
            first,
            WriteOutcome {
                written: 0,
                new_size: file_size,
            },
        ));
    }

    let blocks_cur = ceil_div(file_size, block_size);
    let blocks_req = ceil_div(offset + src.len() as u64, block_size);

    let (mut new_first, mut n) = (first, src.len() as u64);
    if blocks_req > blocks_cur {
        let needed = (blocks_req - blocks_cur) as u16;
        let tail = fat.chain(first).last().copied();
        let (maybe_first, allocated) = fat.extend_chain(device, superblock, tail, needed)?;
        if first.is_none() {
            new_first = maybe_first;
        }
        if u16::from(allocated) < needed {
            // Disk filled up partway through: shrink the write so it fills
            // exactly the space that became available.
            let room_in_existing = blocks_cur * block_size - file_size;
            n = room_in_existing + u64::from(allocated) * block_size;
        }
    }

    let new_size = if n == 0 { file_size } else { (offset + n).max(file_size) };
    let blocks_new = ceil_div(new_size, block_size);

    let mut buf = read_chain(device, superblock, fat, new_first)?;
    buf.resize((blocks_new * block_size) as usize, 0);
    if n > 0 {
        let start = offset as usize;
        buf[start..start + n as usize].copy_from_slice(&src[..n as usize]);
    }
    write_chain(device, superblock, fat, new_first, &buf)?;

    Ok((
        new_first,
        WriteOutcome {
            written: n,
            new_size,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockDevice;
    use crate::fat::FatTable;

    fn fixture(data_blocks: u16) -> (MemoryBlockDevice, Superblock, FatTable) {
        let sb = Superblock::new(data_blocks, 4096);
        let device = MemoryBlockDevice::new(4096, u64::from(sb.total_blocks));
        let fat = FatTable::new_empty(data_blocks);
        (device, sb, fat)
    }

    #[test]
    fn write_then_read_small() {
        let (device, sb, mut fat) = fixture(4);
        let (first, outcome) = write(&device, &sb, &mut fat, None, 0, 0, b"hello").unwrap();
        assert_eq!(outcome.written, 5);
        assert_eq!(outcome.new_size, 5);

        let mut out = [0u8; 10];
        let n = read(&device, &sb, &fat, first, outcome.new_size, 0, &mut out).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&out[..5], b"hello");
    }

    #[test]
    fn multi_block_write_read_round_trip() {
        let (device, sb, mut fat) = fixture(4);
        let pattern: Vec<u8> = (0..9000u32).map(|i| (i % 251) as u8).collect();
        let (first, outcome) = write(&device, &sb, &mut fat, None, 0, 0, &pattern).unwrap();
        assert_eq!(outcome.new_size, 9000);
        assert_eq!(fat.chain(first).len(), 3);

        let mut out = vec![0u8; 9000];
        let n = read(&device, &sb, &fat, first, outcome.new_size, 0, &mut out).unwrap();
        assert_eq!(n, 9000);
        assert_eq!(out, pattern);
    }

    #[test]
    fn overwrite_middle_preserves_surrounding_zeros() {
        let (device, sb, mut fat) = fixture(4);
        let zeros = vec![0u8; 8192];
        let (first, outcome) = write(&device, &sb, &mut fat, None, 0, 0, &zeros).unwrap();
        assert_eq!(outcome.new_size, 8192);

        let (first, outcome) =
            write(&device, &sb, &mut fat, first, outcome.new_size, 4090, b"ABCDEFGH").unwrap();
        assert_eq!(outcome.written, 8);
        assert_eq!(outcome.new_size, 8192);

        let mut out = vec![0u8; 8192];
        read(&device, &sb, &fat, first, outcome.new_size, 0, &mut out).unwrap();
        assert_eq!(&out[4090..4098], b"ABCDEFGH");
        assert!(out[..4090].iter().all(|&b| b == 0));
        assert!(out[4098..].iter().all(|&b| b == 0));
    }

    #[test]
    fn disk_full_partial_write_from_empty() {
        // exactly 2 data blocks of free space
        let (device, sb, mut fat) = fixture(3);
        let buf = vec![7u8; 3 * 4096];
        let (first, outcome) = write(&device, &sb, &mut fat, None, 0, 0, &buf).unwrap();
        assert_eq!(outcome.written, 2 * 4096);
        assert_eq!(outcome.new_size, 2 * 4096);
        assert!(first.is_some());

        let (_, outcome2) =
            write(&device, &sb, &mut fat, first, outcome.new_size, outcome.new_size, &[1]).unwrap();
        assert_eq!(outcome2.written, 0);
    }

    #[test]
    fn read_at_eof_returns_zero() {
        let (device, sb, mut fat) = fixture(4);
        let (first, outcome) = write(&device, &sb, &mut fat, None, 0, 0, b"abc").unwrap();
        let mut out = [0u8; 4];
        let n = read(&device, &sb, &fat, first, outcome.new_size, 3, &mut out).unwrap();
        assert_eq!(n, 0);
    }
}
