//! File and directory attributes returned by `getattr`.
//!
//! The core crate has no dependency on `libc` or `fuser`; [`Attributes::mode`]
//! returns the full POSIX mode word (type bits and permission bits combined)
//! using the standard `S_IFDIR`/`S_IFREG` octal constants, so a bridge crate
//! can hand the value straight to the kernel without recomputing it.

/// The kind of filesystem object an [`Attributes`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    RegularFile,
}

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// Attributes of a resolved path, per `spec.md` §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attributes {
    pub kind: FileKind,
    pub nlink: u32,
    pub size: u64,
}

impl Attributes {
    /// Attributes for `/` or `/<dir>`: `S_IFDIR | 0755`, link count 2.
    pub fn directory() -> Self {
        Self {
            kind: FileKind::Directory,
            nlink: 2,
            size: 0,
        }
    }

    /// Attributes for `/<dir>/<name>.<ext>`: `S_IFREG | 0666`, link count 1,
    /// size equal to the file's current `fsize`.
    pub fn regular_file(size: u64) -> Self {
        Self {
            kind: FileKind::RegularFile,
            nlink: 1,
            size,
        }
    }

    /// The full POSIX mode word: type bits plus permission bits.
    pub fn mode(&self) -> u32 {
        match self.kind {
            FileKind::Directory => S_IFDIR | 0o755,
            FileKind::RegularFile => S_IFREG | 0o666,
        }
    }
}
