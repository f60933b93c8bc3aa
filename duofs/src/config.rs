//! Filesystem configuration.
//!
//! `spec.md` §9 calls out the backing image path as hard-coded global state
//! in the source this specification was distilled from, and directs that a
//! rewrite parameterize it via a configuration struct instead.

use std::path::PathBuf;

/// Total blocks in a `duofs` image: 1 MiB / 512 bytes per block.
pub const IMAGE_SIZE_BLOCKS: usize = 2048;

/// Block size in bytes, fixed by the on-disk format.
pub const BLOCK_SIZE: usize = 512;

/// Configuration for opening or creating a `duofs` backing image.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the backing image file.
    pub image_path: PathBuf,
    /// Total blocks in the image. Fixed at [`IMAGE_SIZE_BLOCKS`] by the
    /// on-disk format; only exposed so tests can shrink it for small
    /// fixtures (the allocator and layout codec place no assumption on the
    /// value beyond "large enough to hold the reserved region").
    pub image_size_blocks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from(".disk"),
            image_size_blocks: IMAGE_SIZE_BLOCKS,
        }
    }
}

impl Config {
    /// Builds a configuration pointing at `image_path`, using the standard
    /// 1 MiB / 2048-block image size.
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            ..Default::default()
        }
    }
}
