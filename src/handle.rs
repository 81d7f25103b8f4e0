//! The open-file handle table: up to 32 independent (root slot, cursor)
//! pairs. Handles do not survive unmount.

use crate::error::{FsError, Result};
use crate::types::HANDLE_MAX;

#[derive(Debug, Clone, Copy)]
struct Handle {
    /// Root directory slot this handle refers to.
    root_slot: usize,
    /// Byte cursor, always `0 <= offset <= file_size` at API boundaries.
    offset: u64,
}

pub struct HandleTable {
    slots: Vec<Option<Handle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable {
            slots: vec![None; HANDLE_MAX],
        }
    }

    /// Open a new handle on `root_slot` in the lowest free handle id.
    pub fn open(&mut self, root_slot: usize) -> Result<usize> {
        let id = self.slots.iter().position(|h| h.is_none()).ok_or(FsError::HandlesFull)?;
        self.slots[id] = Some(Handle { root_slot, offset: 0 });
        Ok(id)
    }

    pub fn close(&mut self, id: usize) -> Result<()> {
        let slot = self.slots.get_mut(id).ok_or(FsError::BadHandle(id))?;
        if slot.is_none() {
            return Err(FsError::BadHandle(id));
        }
        *slot = None;
        Ok(())
    }

    fn get(&self, id: usize) -> Result<&Handle> {
        self.slots
            .get(id)
            .and_then(|h| h.as_ref())
            .ok_or(FsError::BadHandle(id))
    }

    fn get_mut(&mut self, id: usize) -> Result<&mut Handle> {
        self.slots
            .get_mut(id)
            .and_then(|h| h.as_mut())
            .ok_or(FsError::BadHandle(id))
    }

    pub fn root_slot(&self, id: usize) -> Result<usize> {
        Ok(self.get(id)?.root_slot)
    }

    pub fn offset(&self, id: usize) -> Result<u64> {
        Ok(self.get(id)?.offset)
    }

    /// Move the cursor to `offset`, which the caller must already have
    /// checked against the file's current size.
    pub fn set_offset(&mut self, id: usize, offset: u64) -> Result<()> {
        self.get_mut(id)?.offset = offset;
        Ok(())
    }

    pub fn advance(&mut self, id: usize, n: u64) -> Result<()> {
        let h = self.get_mut(id)?;
        h.offset += n;
        Ok(())
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|h| h.is_some()).count()
    }

    /// Whether `root_slot` currently has any open handle pointing at it -
    /// used to reject `delete` on an open file rather than leaving a
    /// dangling handle behind.
    pub fn is_open(&self, root_slot: usize) -> bool {
        self.slots
            .iter()
            .any(|h| matches!(h, Some(Handle { root_slot: s, .. }) if *s == root_slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_assigns_lowest_free_id() {
        let mut t = HandleTable::new();
        assert_eq!(t.open(0).unwrap(), 0);
        assert_eq!(t.open(1).unwrap(), 1);
        t.close(0).unwrap();
        assert_eq!(t.open(2).unwrap(), 0);
    }

    #[test]
    fn independent_cursors_for_same_file() {
        let mut t = HandleTable::new();
        let a = t.open(0).unwrap();
        let b = t.open(0).unwrap();
        t.set_offset(a, 10).unwrap();
        assert_eq!(t.offset(a).unwrap(), 10);
        assert_eq!(t.offset(b).unwrap(), 0);
    }

    #[test]
    fn close_unused_handle_fails() {
        let mut t = HandleTable::new();
        assert!(matches!(t.close(0), Err(FsError::BadHandle(0))));
    }

    #[test]
    fn handles_full_is_reported() {
        let mut t = HandleTable::new();
        for _ in 0..HANDLE_MAX {
            t.open(0).unwrap();
        }
        assert!(matches!(t.open(0), Err(FsError::HandlesFull)));
    }
}
