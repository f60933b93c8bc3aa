//! Directory service.
//!
//! Resolves `/dir` and `/dir/file.ext` paths against [`Root`] and per-
//! directory [`DirectoryEntry`] tables, and implements the path-addressed
//! operations named in `spec.md` §4.4: `getattr`, `readdir`, `mkdir`,
//! `mknod`, and the no-op `rmdir`/`unlink`/`truncate`.

use crate::allocator::Allocator;
use crate::attrs::Attributes;
use crate::disk_layout::{
    DirRecord, DirectoryEntry, MAX_EXT_LEN, MAX_NAME_LEN,
};
use crate::error::{Error, Result};
use crate::FileSystem;

/// A parsed path, replacing the field-triple-plus-flags pattern the source
/// this specification was distilled from uses (`spec.md` §9 "Polymorphism").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathKind {
    /// `/`.
    Root,
    /// `/<dir>`. `dir` may be empty only for the bare-root case, which is
    /// represented by [`PathKind::Root`] instead, so a non-root `Directory`
    /// always carries a non-empty name.
    Directory(String),
    /// `/<dir>/<name>.<ext>`. Any of `name`/`ext` may be empty, reflecting
    /// `spec.md` §4.4's "a missing component parses as an empty string";
    /// callers that require all three components non-empty (`mknod`,
    /// `read`, `write`) check that explicitly.
    File {
        dir: String,
        name: String,
        ext: String,
    },
}

/// Parses a path of the form `/`, `/<dir>`, or `/<dir>/<name>.<ext>`.
///
/// Fails with [`Error::NameTooLong`] if `dir` exceeds 8 characters, `name`
/// exceeds 8 characters, or `ext` exceeds 3 characters. Fails with
/// [`Error::InvalidArgument`] for paths that don't start with `/` or that
/// nest a third path component (subdirectories beyond depth one are out of
/// scope, per `spec.md` §1).
pub fn parse_path(path: &str) -> Result<PathKind> {
    if path == "/" {
        return Ok(PathKind::Root);
    }
    let rest = path.strip_prefix('/').ok_or(Error::InvalidArgument)?;
    if rest.is_empty() {
        return Err(Error::InvalidArgument);
    }
    let mut components = rest.splitn(2, '/');
    let dir = components.next().unwrap_or("");
    if dir.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    match components.next() {
        None => Ok(PathKind::Directory(dir.to_string())),
        Some(file_part) => {
            if file_part.is_empty() || file_part.contains('/') {
                return Err(Error::InvalidArgument);
            }
            let (name, ext) = match file_part.split_once('.') {
                Some((n, e)) => (n, e),
                None => (file_part, ""),
            };
            if name.len() > MAX_NAME_LEN || ext.len() > MAX_EXT_LEN {
                return Err(Error::NameTooLong);
            }
            Ok(PathKind::File {
                dir: dir.to_string(),
                name: name.to_string(),
                ext: ext.to_string(),
            })
        }
    }
}

impl FileSystem {
    pub(crate) fn find_dir_record(&mut self, dir: &str) -> Result<DirRecord> {
        let root = self.load_root()?;
        root.entries
            .into_iter()
            .find(|e| e.name == dir)
            .ok_or(Error::NotFound)
    }

    pub(crate) fn find_file_record(
        &mut self,
        dir: &str,
        name: &str,
        ext: &str,
    ) -> Result<(DirRecord, DirectoryEntry, usize)> {
        let dir_rec = self.find_dir_record(dir)?;
        let entry = self.load_directory_entry(dir_rec.start_block)?;
        let idx = entry
            .files
            .iter()
            .position(|f| f.name == name && f.ext == ext)
            .ok_or(Error::NotFound)?;
        Ok((dir_rec, entry, idx))
    }

    /// Resolves `path` and returns its attributes, per `spec.md` §4.4
    /// `getattr`.
    pub fn getattr(&mut self, path: &str) -> Result<Attributes> {
        match parse_path(path)? {
            PathKind::Root => Ok(Attributes::directory()),
            PathKind::Directory(dir) => {
                self.find_dir_record(&dir)?;
                Ok(Attributes::directory())
            }
            PathKind::File { dir, name, ext } => {
                let (_, entry, idx) = self.find_file_record(&dir, &name, &ext)?;
                Ok(Attributes::regular_file(entry.files[idx].size))
            }
        }
    }

    /// Lists directory contents, per `spec.md` §4.4 `readdir`. Every listing
    /// begins with `.` and `..`. Paths identifying a file are an error.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<String>> {
        match parse_path(path)? {
            PathKind::Root => {
                let root = self.load_root()?;
                let mut names = vec![".".to_string(), "..".to_string()];
                names.extend(root.entries.into_iter().map(|e| e.name));
                Ok(names)
            }
            PathKind::Directory(dir) => {
                let dir_rec = self.find_dir_record(&dir)?;
                let entry = self.load_directory_entry(dir_rec.start_block)?;
                let mut names = vec![".".to_string(), "..".to_string()];
                names.extend(entry.files.into_iter().map(|f| {
                    if f.ext.is_empty() {
                        f.name
                    } else {
                        format!("{}.{}", f.name, f.ext)
                    }
                }));
                Ok(names)
            }
            PathKind::File { .. } => Err(Error::InvalidArgument),
        }
    }

    /// Creates a new top-level directory, per `spec.md` §4.4 `mkdir`.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let dir = match parse_path(path)? {
            PathKind::Directory(dir) if !dir.is_empty() => dir,
            _ => return Err(Error::InvalidArgument),
        };

        let mut root = self.load_root()?;
        if root.entries.iter().any(|e| e.name == dir) {
            return Err(Error::AlreadyExists);
        }
        if root.entries.len() >= crate::disk_layout::ROOT_ENTRY_CAPACITY {
            return Err(Error::NoSpaceLeft);
        }

        let block = {
            let mut alloc = Allocator::new(&mut self.device);
            alloc.find_free()?.ok_or(Error::NoSpaceLeft)?
        };
        // mark-then-initialize: an interrupted mkdir leaves a bit claimed
        // but unused, recoverable by fsck (spec.md §4.3).
        {
            let mut alloc = Allocator::new(&mut self.device);
            alloc.mark_used(block)?;
        }
        self.device
            .write_block(block as usize, &DirectoryEntry::empty().encode())?;

        root.entries.push(DirRecord {
            name: dir,
            start_block: block,
        });
        self.persist_root(&root)?;
        Ok(())
    }

    /// Creates a new zero-length file, per `spec.md` §4.4 `mknod`.
    pub fn mknod(&mut self, path: &str) -> Result<()> {
        let (dir, name, ext) = match parse_path(path)? {
            PathKind::File { dir, name, ext } if !dir.is_empty() && !name.is_empty() && !ext.is_empty() => {
                (dir, name, ext)
            }
            PathKind::File { .. } => return Err(Error::InvalidArgument),
            _ => return Err(Error::InvalidArgument),
        };

        let dir_rec = self.find_dir_record(&dir)?;
        let mut entry = self.load_directory_entry(dir_rec.start_block)?;
        if entry.files.iter().any(|f| f.name == name && f.ext == ext) {
            return Err(Error::AlreadyExists);
        }
        if entry.files.len() >= crate::disk_layout::DIR_ENTRY_CAPACITY {
            return Err(Error::NoSpaceLeft);
        }

        let block = {
            let mut alloc = Allocator::new(&mut self.device);
            alloc.find_free()?.ok_or(Error::NoSpaceLeft)?
        };
        // initialize-then-mark: an interrupted write leaves a written block
        // unclaimed, recoverable by fsck (spec.md §4.3).
        self.device
            .write_block(block as usize, &crate::disk_layout::DataBlock::empty().encode())?;
        {
            let mut alloc = Allocator::new(&mut self.device);
            alloc.mark_used(block)?;
        }

        entry.files.push(crate::disk_layout::FileRecord {
            name,
            ext,
            size: 0,
            start_block: block,
        });
        self.device
            .write_block(dir_rec.start_block as usize, &entry.encode())?;
        Ok(())
    }

    /// No-op success: directory deletion is out of scope (`spec.md` §1, §4.4).
    pub fn rmdir(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// No-op success: file deletion is out of scope (`spec.md` §1, §4.4).
    pub fn unlink(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// No-op success: truncation beyond initial zero-size creation is out
    /// of scope (`spec.md` §1, §4.4).
    pub fn truncate(&mut self, _path: &str, _size: u64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root() {
        assert_eq!(parse_path("/").unwrap(), PathKind::Root);
    }

    #[test]
    fn parses_directory() {
        assert_eq!(
            parse_path("/docs").unwrap(),
            PathKind::Directory("docs".to_string())
        );
    }

    #[test]
    fn parses_file_with_extension() {
        assert_eq!(
            parse_path("/docs/readme.txt").unwrap(),
            PathKind::File {
                dir: "docs".to_string(),
                name: "readme".to_string(),
                ext: "txt".to_string(),
            }
        );
    }

    #[test]
    fn parses_file_without_extension_as_empty() {
        assert_eq!(
            parse_path("/docs/readme").unwrap(),
            PathKind::File {
                dir: "docs".to_string(),
                name: "readme".to_string(),
                ext: "".to_string(),
            }
        );
    }

    #[test]
    fn nine_char_directory_is_name_too_long() {
        assert!(matches!(parse_path("/directoryX"), Err(Error::NameTooLong)));
    }

    #[test]
    fn nested_subdirectory_is_invalid_argument() {
        assert!(matches!(
            parse_path("/a/b/c.txt"),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn bare_path_without_leading_slash_is_invalid() {
        assert!(matches!(parse_path("docs"), Err(Error::InvalidArgument)));
    }
}
