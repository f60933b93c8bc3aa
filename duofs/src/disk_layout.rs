//! On-disk layout of the four persistent structures.
//!
//! This module defines the **on-disk layout** of `duofs`'s metadata and data
//! structures: [`Root`], [`AllocationTable`], [`DirectoryEntry`], and
//! [`DataBlock`]. Each is exactly [`BLOCK_SIZE`] (512) bytes on disk (the
//! allocation table occupies [`ALLOCATION_TABLE_BLOCKS`] consecutive
//! blocks). Every type here provides an `encode`/`decode` pair that
//! reproduces the wire layout byte-exactly, with no padding beyond the
//! explicit zero-filled tail each structure specifies.
//!
//! Name fields (`dname`, `fname`, `fext`) are stored as fixed-width,
//! zero-padded byte arrays: one byte longer than the maximum visible name
//! so that a short name's trailing byte is always `0x00`, mirroring the
//! NUL-terminated `char[N+1]` fields of the format this module reproduces.

use crate::config::BLOCK_SIZE;
use crate::error::{Error, Result};

/// Maximum visible characters in a directory name or a file's base name.
pub const MAX_NAME_LEN: usize = 8;
/// Maximum visible characters in a file extension.
pub const MAX_EXT_LEN: usize = 3;

const NAME_FIELD_LEN: usize = MAX_NAME_LEN + 1;
const EXT_FIELD_LEN: usize = MAX_EXT_LEN + 1;

/// Number of blocks occupied by the [`AllocationTable`].
pub const ALLOCATION_TABLE_BLOCKS: usize = 4;
/// Total number of block entries tracked by the allocation table, and the
/// standard total block count of a `duofs` image.
pub const ALLOCATION_TABLE_ENTRIES: usize = ALLOCATION_TABLE_BLOCKS * BLOCK_SIZE;
const _: () = assert!(ALLOCATION_TABLE_ENTRIES == 2048);

/// Payload bytes available per [`DataBlock`], after its 8-byte header.
pub const MAX_DATA_IN_BLOCK: usize = BLOCK_SIZE - 8;

/// Capacity of [`Root`]'s directory table.
pub const ROOT_ENTRY_CAPACITY: usize = (BLOCK_SIZE - 4) / (NAME_FIELD_LEN + 8);
/// Capacity of a [`DirectoryEntry`]'s file table.
pub const DIR_ENTRY_CAPACITY: usize =
    (BLOCK_SIZE - 4) / (NAME_FIELD_LEN + EXT_FIELD_LEN + 8 + 8);

/// Blocks 0-5 are always reserved: 0 is [`Root`], 1-4 are the
/// [`AllocationTable`], 5 is reserved-unused (see `spec.md` §9.1).
pub const FIRST_ALLOCATABLE_BLOCK: i64 = 6;

fn encode_fixed(s: &str, field_len: usize) -> Result<Vec<u8>> {
    if s.len() > field_len - 1 || s.as_bytes().contains(&0) {
        return Err(Error::NameTooLong);
    }
    let mut out = vec![0u8; field_len];
    out[..s.len()].copy_from_slice(s.as_bytes());
    Ok(out)
}

fn decode_fixed(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(|s| s.to_string())
        .map_err(|_| Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "non-UTF-8 name in on-disk structure",
        )))
}

/// A single entry in [`Root`]: one top-level directory's name and the block
/// holding its [`DirectoryEntry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirRecord {
    pub name: String,
    pub start_block: i64,
}

/// On-disk block 0: the table of top-level directories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Root {
    pub entries: Vec<DirRecord>,
}

impl Root {
    /// An empty root, as written by [`crate::device::BlockDevice::format`].
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Encodes this root into its 512-byte on-disk form.
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..4].copy_from_slice(&(self.entries.len() as u32).to_le_bytes());
        let mut off = 4;
        for entry in &self.entries {
            let name = encode_fixed(&entry.name, NAME_FIELD_LEN).expect("validated at insert time");
            buf[off..off + NAME_FIELD_LEN].copy_from_slice(&name);
            off += NAME_FIELD_LEN;
            buf[off..off + 8].copy_from_slice(&entry.start_block.to_le_bytes());
            off += 8;
        }
        buf
    }

    /// Decodes a root from its 512-byte on-disk form.
    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let n = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        if n > ROOT_ENTRY_CAPACITY {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "root directory count exceeds capacity",
            )));
        }
        let mut entries = Vec::with_capacity(n);
        let mut off = 4;
        for _ in 0..n {
            let name = decode_fixed(&buf[off..off + NAME_FIELD_LEN])?;
            off += NAME_FIELD_LEN;
            let start_block = i64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
            off += 8;
            entries.push(DirRecord { name, start_block });
        }
        Ok(Self { entries })
    }
}

/// On-disk blocks 1-4: a flat byte-per-block allocation bitmap.
///
/// Value `0` marks a block free; `1` marks it in use. Indices 0-5 are never
/// handed out by the allocator, but their bits are not necessarily set (see
/// `spec.md` §9.1 for why block 5 in particular is left unmarked).
#[derive(Clone, Debug)]
pub struct AllocationTable {
    entries: [u8; ALLOCATION_TABLE_ENTRIES],
}

impl AllocationTable {
    /// An all-free table with blocks 0-4 marked in use (Root and the
    /// allocation table itself occupy those blocks and so are never free,
    /// even though `find_free` never needs to consult these bits directly).
    pub fn empty() -> Self {
        let mut entries = [0u8; ALLOCATION_TABLE_ENTRIES];
        for i in 0..5 {
            entries[i] = 1;
        }
        Self { entries }
    }

    pub fn encode(&self) -> [u8; ALLOCATION_TABLE_ENTRIES] {
        self.entries
    }

    pub fn decode(buf: &[u8; ALLOCATION_TABLE_ENTRIES]) -> Self {
        Self { entries: *buf }
    }

    pub fn get(&self, idx: usize) -> bool {
        self.entries[idx] != 0
    }

    pub fn set(&mut self, idx: usize, used: bool) {
        self.entries[idx] = used as u8;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A single entry in a [`DirectoryEntry`]: one file's name, extension,
/// size, and the block starting its data chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub ext: String,
    pub size: u64,
    pub start_block: i64,
}

/// An allocated block holding one directory's file table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub files: Vec<FileRecord>,
}

impl DirectoryEntry {
    /// A freshly allocated, empty directory table, as written by `mkdir`.
    pub fn empty() -> Self {
        Self { files: Vec::new() }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..4].copy_from_slice(&(self.files.len() as u32).to_le_bytes());
        let mut off = 4;
        for file in &self.files {
            let name = encode_fixed(&file.name, NAME_FIELD_LEN).expect("validated at insert time");
            buf[off..off + NAME_FIELD_LEN].copy_from_slice(&name);
            off += NAME_FIELD_LEN;
            let ext = encode_fixed(&file.ext, EXT_FIELD_LEN).expect("validated at insert time");
            buf[off..off + EXT_FIELD_LEN].copy_from_slice(&ext);
            off += EXT_FIELD_LEN;
            buf[off..off + 8].copy_from_slice(&file.size.to_le_bytes());
            off += 8;
            buf[off..off + 8].copy_from_slice(&file.start_block.to_le_bytes());
            off += 8;
        }
        buf
    }

    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let n = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        if n > DIR_ENTRY_CAPACITY {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "directory file count exceeds capacity",
            )));
        }
        let mut files = Vec::with_capacity(n);
        let mut off = 4;
        for _ in 0..n {
            let name = decode_fixed(&buf[off..off + NAME_FIELD_LEN])?;
            off += NAME_FIELD_LEN;
            let ext = decode_fixed(&buf[off..off + EXT_FIELD_LEN])?;
            off += EXT_FIELD_LEN;
            let size = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
            off += 8;
            let start_block = i64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
            off += 8;
            files.push(FileRecord { name, ext, size, start_block });
        }
        Ok(Self { files })
    }
}

/// One block of a file's data chain: an 8-byte `next_block` header
/// followed by [`MAX_DATA_IN_BLOCK`] payload bytes.
///
/// `next_block == 0` signals end-of-chain (block 0 is [`Root`] and so is
/// never a valid successor).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataBlock {
    pub next_block: i64,
    pub payload: Box<[u8; MAX_DATA_IN_BLOCK]>,
}

impl DataBlock {
    /// A freshly allocated, zero-filled, end-of-chain block.
    pub fn empty() -> Self {
        Self {
            next_block: 0,
            payload: Box::new([0u8; MAX_DATA_IN_BLOCK]),
        }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..8].copy_from_slice(&self.next_block.to_le_bytes());
        buf[8..].copy_from_slice(self.payload.as_slice());
        buf
    }

    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Self {
        let next_block = i64::from_le_bytes(buf[0..8].try_into().unwrap());
        let mut payload = Box::new([0u8; MAX_DATA_IN_BLOCK]);
        payload.copy_from_slice(&buf[8..]);
        Self { next_block, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_round_trips() {
        let root = Root {
            entries: vec![
                DirRecord { name: "docs".into(), start_block: 6 },
                DirRecord { name: "verylong".into(), start_block: 123456 },
            ],
        };
        let encoded = root.encode();
        assert_eq!(Root::decode(&encoded).unwrap(), root);
    }

    #[test]
    fn root_capacity_is_29() {
        assert_eq!(ROOT_ENTRY_CAPACITY, 29);
    }

    #[test]
    fn directory_entry_capacity_is_17() {
        assert_eq!(DIR_ENTRY_CAPACITY, 17);
    }

    #[test]
    fn directory_entry_round_trips() {
        let dir = DirectoryEntry {
            files: vec![
                FileRecord { name: "readme".into(), ext: "txt".into(), size: 42, start_block: 7 },
                FileRecord { name: "a".into(), ext: "".into(), size: 0, start_block: 8 },
            ],
        };
        let encoded = dir.encode();
        assert_eq!(DirectoryEntry::decode(&encoded).unwrap(), dir);
    }

    #[test]
    fn data_block_round_trips() {
        let mut block = DataBlock::empty();
        block.next_block = 99;
        block.payload[0] = 0xAB;
        block.payload[MAX_DATA_IN_BLOCK - 1] = 0xCD;
        let encoded = block.encode();
        assert_eq!(DataBlock::decode(&encoded), block);
    }

    #[test]
    fn name_too_long_rejected() {
        let root = Root {
            entries: vec![DirRecord { name: "directoryX".into(), start_block: 6 }],
        };
        // encode() itself only panics via expect() on pre-validated data;
        // callers validate at parse time. Direct encode_fixed is what
        // surfaces NameTooLong.
        assert!(encode_fixed(&root.entries[0].name, NAME_FIELD_LEN).is_err());
    }

    #[test]
    fn allocation_table_tracks_bits() {
        let mut table = AllocationTable::empty();
        assert!(table.get(0));
        assert!(!table.get(6));
        table.set(6, true);
        assert!(table.get(6));
        table.set(6, false);
        assert!(!table.get(6));
    }
}
