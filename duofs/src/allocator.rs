//! Block allocator.
//!
//! Reads and writes the allocation bitmap described in `spec.md` §3 and
//! arbitrates block ownership for the rest of the filesystem. Indices 0-5
//! are reserved and never handed out by [`Allocator::find_free`]; see
//! `spec.md` §9.1 for why block 5's bit is never set even though it too is
//! unavailable.

use crate::device::BlockDevice;
use crate::disk_layout::{AllocationTable, FIRST_ALLOCATABLE_BLOCK};
use crate::error::{Error, Result};

/// The block allocator, a thin view over the device's allocation table.
///
/// An `Allocator` does not cache the table across calls: each operation
/// reads the table, mutates it, and (for mutating calls) writes the whole
/// table back in one synchronous call, matching `spec.md` §4.3's "writes
/// back the entire 4-block table atomically relative to other Allocator
/// calls".
pub struct Allocator<'a> {
    device: &'a mut BlockDevice,
}

impl<'a> Allocator<'a> {
    pub fn new(device: &'a mut BlockDevice) -> Self {
        Self { device }
    }

    fn load(&mut self) -> Result<AllocationTable> {
        Ok(AllocationTable::decode(&self.device.read_table()?))
    }

    fn store(&mut self, table: &AllocationTable) -> Result<()> {
        self.device.write_table(&table.encode())
    }

    /// Returns whether block `idx` is currently marked in use.
    pub fn is_used(&mut self, idx: i64) -> Result<bool> {
        let table = self.load()?;
        Ok(table.get(idx as usize))
    }

    /// Scans the bitmap from index 6 through 2047 (inclusive) and returns
    /// the first free block, lowest index first. Returns `None` if the
    /// image is full.
    ///
    /// This call alone does not mark the returned block used; callers
    /// follow up with [`Allocator::mark_used`], choosing the ordering
    /// relative to initializing the block's contents as `spec.md` §4.3
    /// prescribes for their specific caller (mkdir vs. write-extension).
    pub fn find_free(&mut self) -> Result<Option<i64>> {
        let table = self.load()?;
        for idx in FIRST_ALLOCATABLE_BLOCK as usize..table.len() {
            if !table.get(idx) {
                return Ok(Some(idx as i64));
            }
        }
        Ok(None)
    }

    /// Marks block `idx` in use.
    pub fn mark_used(&mut self, idx: i64) -> Result<()> {
        self.toggle(idx, true)
    }

    /// Marks block `idx` free.
    pub fn mark_free(&mut self, idx: i64) -> Result<()> {
        self.toggle(idx, false)
    }

    fn toggle(&mut self, idx: i64, used: bool) -> Result<()> {
        if idx < FIRST_ALLOCATABLE_BLOCK {
            log::warn!("refusing to toggle reserved block {idx}");
            return Err(Error::InvalidArgument);
        }
        let mut table = self.load()?;
        table.set(idx as usize, used);
        self.store(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tmp_device() -> (tempfile::TempDir, BlockDevice) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".disk");
        let device = BlockDevice::format(&Config::new(&path)).unwrap();
        (dir, device)
    }

    #[test]
    fn find_free_skips_reserved_range() {
        let (_dir, mut device) = tmp_device();
        let mut alloc = Allocator::new(&mut device);
        assert_eq!(alloc.find_free().unwrap(), Some(6));
    }

    #[test]
    fn mark_used_then_find_free_advances() {
        let (_dir, mut device) = tmp_device();
        let mut alloc = Allocator::new(&mut device);
        alloc.mark_used(6).unwrap();
        assert_eq!(alloc.find_free().unwrap(), Some(7));
        assert!(alloc.is_used(6).unwrap());
        alloc.mark_free(6).unwrap();
        assert_eq!(alloc.find_free().unwrap(), Some(6));
    }

    #[test]
    fn full_image_reports_none_free() {
        let (_dir, mut device) = tmp_device();
        let mut alloc = Allocator::new(&mut device);
        for idx in 6..2048 {
            alloc.mark_used(idx).unwrap();
        }
        assert_eq!(alloc.find_free().unwrap(), None);
    }

    #[test]
    fn reserved_blocks_cannot_be_toggled() {
        let (_dir, mut device) = tmp_device();
        let mut alloc = Allocator::new(&mut device);
        assert!(alloc.mark_used(5).is_err());
        assert!(alloc.mark_used(0).is_err());
    }
}
