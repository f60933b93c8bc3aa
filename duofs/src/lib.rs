//! `duofs` — on-disk layout, block allocator, and file I/O engine for a
//! two-level-namespace image filesystem.
//!
//! A `duofs` image is a single fixed-size 1 MiB file laid out as 2048
//! consecutive 512-byte blocks:
//!
//! ```text
//! ┌────────────┐
//! │ block 0    │  Root: the top-level directory table
//! ├────────────┤
//! │ blocks 1-4 │  AllocationTable: one byte per block, 0=free 1=in-use
//! ├────────────┤
//! │ block 5    │  reserved, unused
//! ├────────────┤
//! │ blocks     │  DirectoryEntry blocks (one per top-level directory)
//! │ 6..2047    │  and DataBlock chains (one linked chain per file)
//! └────────────┘
//! ```
//!
//! The namespace is two levels deep: `/` contains directories, each
//! directory contains regular files (`8.3`-encoded names), and nothing
//! nests any deeper. [`FileSystem`] is the single entry point; its methods
//! correspond one-to-one with the operation surface a kernel-to-userspace
//! filesystem bridge would dispatch (see the sibling `duofs-fuse` crate for
//! such a bridge, built on `fuser`).
//!
//! This crate is intentionally free of any VFS-bridge, permission, or
//! process-argument-handling concerns: those are thin adapters layered on
//! top, not part of the on-disk format or its allocator.

pub mod allocator;
pub mod attrs;
pub mod config;
pub mod device;
pub mod directory;
pub mod disk_layout;
pub mod error;
pub mod file;

pub use attrs::{Attributes, FileKind};
pub use config::Config;
pub use directory::PathKind;
pub use error::{Error, Result};

use device::BlockDevice;
use disk_layout::{DirectoryEntry, Root};

/// The filesystem core: a backing [`BlockDevice`] plus the directory
/// service and file I/O engine methods implemented across this crate's
/// modules (see [`directory`] and [`file`]).
pub struct FileSystem {
    device: BlockDevice,
}

impl FileSystem {
    /// Opens an existing `duofs` image described by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            device: BlockDevice::open(config)?,
        })
    }

    /// Creates and initializes a fresh `duofs` image described by `config`,
    /// overwriting any existing file at `config.image_path`.
    pub fn format(config: &Config) -> Result<Self> {
        Ok(Self {
            device: BlockDevice::format(config)?,
        })
    }

    /// Opens the image at `config.image_path`, formatting a new one if it
    /// does not already exist with the expected size.
    pub fn open_or_format(config: &Config) -> Result<Self> {
        Ok(Self {
            device: BlockDevice::open_or_format(config)?,
        })
    }

    pub(crate) fn load_root(&mut self) -> Result<Root> {
        Root::decode(&self.device.read_block(0)?)
    }

    pub(crate) fn persist_root(&mut self, root: &Root) -> Result<()> {
        self.device.write_block(0, &root.encode())
    }

    pub(crate) fn load_directory_entry(&mut self, start_block: i64) -> Result<DirectoryEntry> {
        DirectoryEntry::decode(&self.device.read_block(start_block as usize)?)
    }

    pub(crate) fn load_data_block(&mut self, idx: i64) -> Result<disk_layout::DataBlock> {
        Ok(disk_layout::DataBlock::decode(
            &self.device.read_block(idx as usize)?,
        ))
    }

    pub(crate) fn persist_data_block(
        &mut self,
        idx: i64,
        block: &disk_layout::DataBlock,
    ) -> Result<()> {
        self.device.write_block(idx as usize, &block.encode())
    }
}
