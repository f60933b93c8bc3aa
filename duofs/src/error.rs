//! Error taxonomy for the filesystem core.
//!
//! Every public operation in [`crate::FileSystem`] returns `Result<_, Error>`.
//! Variants map one-to-one onto `spec.md`'s error taxonomy; [`Error::to_errno`]
//! gives the conventional negative errno a bridge crate would hand back to the
//! kernel.

use std::path::PathBuf;

/// Errors produced by the filesystem core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A path component does not exist.
    #[error("no such file or directory")]
    NotFound,
    /// A path component exceeds its bound (8/8/3 characters).
    #[error("name too long")]
    NameTooLong,
    /// A directory or file name collides with an existing entry.
    #[error("already exists")]
    AlreadyExists,
    /// A path was malformed for the requested operation, or a write ran out
    /// of free blocks mid-write.
    #[error("invalid argument")]
    InvalidArgument,
    /// The root directory table, a directory's file table, or the block
    /// allocator has no room left.
    #[error("no space left on device")]
    NoSpaceLeft,
    /// A read offset exceeds the current file size.
    #[error("file too large")]
    FileTooLarge,
    /// Reserved; never produced by the core itself.
    #[error("permission denied")]
    PermissionDenied,
    /// The backing image could not be read/written, or a block chain was
    /// found to be malformed while walking it.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The backing image at `path` does not have the expected size.
    #[error("backing image {path:?} has the wrong size ({actual} bytes, expected {expected})")]
    BadImageSize {
        path: PathBuf,
        actual: u64,
        expected: u64,
    },
}

impl Error {
    /// Maps this error onto the conventional negative `libc` errno a
    /// kernel-to-userspace bridge returns for a failed VFS callback.
    ///
    /// The core crate does not depend on `libc` itself; this method returns
    /// the plain positive errno value (e.g. `ENOENT`), leaving the sign
    /// flip to the caller, since that convention belongs to the bridge.
    pub fn to_errno(&self) -> i32 {
        match self {
            Error::NotFound => libc_like::ENOENT,
            Error::NameTooLong => libc_like::ENAMETOOLONG,
            Error::AlreadyExists => libc_like::EEXIST,
            Error::InvalidArgument => libc_like::EINVAL,
            Error::NoSpaceLeft => libc_like::ENOSPC,
            Error::FileTooLarge => libc_like::EFBIG,
            Error::PermissionDenied => libc_like::EACCES,
            Error::Io(_) | Error::BadImageSize { .. } => libc_like::EIO,
        }
    }
}

/// Errno constants duplicated from `libc` so that the core crate has no
/// dependency on it. The bridge crate re-derives the same values from
/// `libc` directly and the two are asserted equal in its own tests.
mod libc_like {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EACCES: i32 = 13;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const EFBIG: i32 = 27;
    pub const ENOSPC: i32 = 28;
    pub const ENAMETOOLONG: i32 = 36;
}

pub type Result<T> = std::result::Result<T, Error>;
