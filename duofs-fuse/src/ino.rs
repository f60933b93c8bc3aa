//! Inode-number table.
//!
//! `duofs`'s core is addressed by path, not by inode number, so the bridge
//! keeps its own stable mapping from FUSE `ino` to a resolved path, the same
//! mismatch `casys-kaist-KeOS`'s `fs/simple_fs` bridge solves with its
//! `GLOBAL_SIMPLEFS_INO_TABLE`: inode numbers are handed out lazily, the
//! first time a path is looked up, and never reused while the bridge runs.

use std::collections::BTreeMap;

/// The fixed inode number of the filesystem root, per the FUSE convention.
pub const ROOT_INO: u64 = 1;

/// What a non-root inode number resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Directory { name: String },
    File { dir: String, name: String, ext: String },
}

impl Entry {
    /// The absolute `duofs` path this entry resolves to.
    pub fn path(&self) -> String {
        match self {
            Entry::Directory { name } => format!("/{name}"),
            Entry::File { dir, name, ext } => {
                if ext.is_empty() {
                    format!("/{dir}/{name}")
                } else {
                    format!("/{dir}/{name}.{ext}")
                }
            }
        }
    }
}

/// Stable path-to-inode assignment. Inode 1 is always the root; every other
/// path gets the next free number the first time it's looked up.
#[derive(Default)]
pub struct InoTable {
    next: u64,
    by_ino: BTreeMap<u64, Entry>,
    by_path: BTreeMap<String, u64>,
}

impl InoTable {
    pub fn new() -> Self {
        Self {
            next: ROOT_INO + 1,
            by_ino: BTreeMap::new(),
            by_path: BTreeMap::new(),
        }
    }

    /// Returns the entry a non-root inode resolves to, if any.
    pub fn entry(&self, ino: u64) -> Option<&Entry> {
        self.by_ino.get(&ino)
    }

    /// The `duofs` path `ino` resolves to (`"/"` for [`ROOT_INO`]).
    pub fn path_of(&self, ino: u64) -> Option<String> {
        if ino == ROOT_INO {
            Some("/".to_string())
        } else {
            self.entry(ino).map(Entry::path)
        }
    }

    /// Looks up (assigning one if needed) the inode number for `entry`.
    pub fn ino_for(&mut self, entry: Entry) -> u64 {
        let path = entry.path();
        if let Some(&ino) = self.by_path.get(&path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.by_path.insert(path, ino);
        self.by_ino.insert(ino, entry);
        ino
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_resolves_without_assignment() {
        let table = InoTable::new();
        assert_eq!(table.path_of(ROOT_INO), Some("/".to_string()));
    }

    #[test]
    fn first_non_root_entry_gets_ino_two() {
        let mut table = InoTable::new();
        let ino = table.ino_for(Entry::Directory { name: "docs".into() });
        assert_eq!(ino, 2);
        assert_eq!(table.path_of(ino), Some("/docs".to_string()));
    }

    #[test]
    fn repeated_lookup_returns_the_same_ino() {
        let mut table = InoTable::new();
        let first = table.ino_for(Entry::Directory { name: "docs".into() });
        let second = table.ino_for(Entry::Directory { name: "docs".into() });
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_paths_get_distinct_inos() {
        let mut table = InoTable::new();
        let docs = table.ino_for(Entry::Directory { name: "docs".into() });
        let file = table.ino_for(Entry::File {
            dir: "docs".into(),
            name: "readme".into(),
            ext: "txt".into(),
        });
        assert_ne!(docs, file);
    }

    #[test]
    fn file_entry_without_extension_omits_the_dot() {
        let entry = Entry::File {
            dir: "docs".into(),
            name: "readme".into(),
            ext: "".into(),
        };
        assert_eq!(entry.path(), "/docs/readme");
    }
}
