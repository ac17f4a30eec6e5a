//! The staging-area index file.
//!
//! On disk: a `"DIRC"` header with version and entry count, fixed-layout
//! entries sorted by path with NUL padding to 8-byte record boundaries,
//! and a trailing SHA-1 over everything before it. Versions 2 and 3 are
//! supported; extension sections between the entries and the trailer are
//! tolerated and ignored.

pub mod entry;
mod read;
mod stage;
mod tree_builder;
mod write;

pub use entry::{EntryFlags, IndexEntry, StatData};
pub use tree_builder::index_to_tree;

use std::path::Path;

use bstr::{BStr, BString, ByteSlice};

/// Magic bytes opening the index file.
pub(crate) const SIGNATURE: &[u8; 4] = b"DIRC";

/// Errors from index reading, writing, and mutation.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index header: {0}")]
    Header(String),

    #[error("unsupported index version {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid index entry at offset {offset}: {reason}")]
    Entry { offset: usize, reason: String },

    #[error("path not in index: {0}")]
    NotInIndex(BString),

    #[error(transparent)]
    Lock(#[from] grit_utils::LockError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Odb(#[from] grit_odb::OdbError),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

/// The in-memory index: entries unique by path, sorted by path bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    version: u32,
    entries: Vec<IndexEntry>,
}

impl Index {
    /// A fresh, empty index.
    pub fn new() -> Self {
        Self {
            version: 2,
            entries: Vec::new(),
        }
    }

    /// Read an index file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let data = std::fs::read(path)?;
        read::parse(&data)
    }

    /// Read an index file, treating a missing file as an empty index.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        match std::fs::read(path) {
            Ok(data) => read::parse(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(IndexError::Io(e)),
        }
    }

    /// Atomically rewrite the index file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        write::write_file(self, path.as_ref())
    }

    /// The format version this index was read as (2 or 3).
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by exact relative path.
    pub fn entry(&self, path: &BStr) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_bytes().cmp(path.as_bytes()))
            .ok()
            .map(|at| &self.entries[at])
    }

    pub fn contains(&self, path: &BStr) -> bool {
        self.entry(path).is_some()
    }

    /// Iterate entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Insert or replace by path, keeping the sort order.
    ///
    /// Paths containing a `.git` component are dropped without complaint:
    /// nothing under the repository directory is ever tracked.
    pub fn add(&mut self, entry: IndexEntry) {
        if entry::has_dot_git_component(&entry.path) {
            return;
        }
        match self
            .entries
            .binary_search_by(|e| e.path.cmp(&entry.path))
        {
            Ok(at) => self.entries[at] = entry,
            Err(at) => self.entries.insert(at, entry),
        }
    }

    /// Remove by exact relative path.
    pub fn remove(&mut self, path: &BStr) -> Result<IndexEntry, IndexError> {
        match self
            .entries
            .binary_search_by(|e| e.path.as_bytes().cmp(path.as_bytes()))
        {
            Ok(at) => Ok(self.entries.remove(at)),
            Err(_) => Err(IndexError::NotInIndex(BString::from(path))),
        }
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub(crate) fn from_parts(version: u32, entries: Vec<IndexEntry>) -> Self {
        Self { version, entries }
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_hash::ObjectName;
    use grit_object::EntryMode;

    fn entry(path: &str, fill: u8) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            id: ObjectName::new([fill; 20]),
            mode: EntryMode::REGULAR,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    #[test]
    fn add_keeps_entries_sorted_and_unique() {
        let mut index = Index::new();
        index.add(entry("zz.txt", 1));
        index.add(entry("aa.txt", 2));
        index.add(entry("mm.txt", 3));
        index.add(entry("aa.txt", 4)); // replaces

        let paths: Vec<_> = index.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, ["aa.txt", "mm.txt", "zz.txt"]);
        assert_eq!(index.entry(BStr::new("aa.txt")).unwrap().id.as_bytes()[0], 4);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn dot_git_paths_are_silently_dropped() {
        let mut index = Index::new();
        index.add(entry(".git/config", 1));
        index.add(entry("dir/.git/hooks", 2));
        index.add(entry("fine/.gitignore", 3));
        index.add(entry(".gitmodules", 4));

        let paths: Vec<_> = index.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, [".gitmodules", "fine/.gitignore"]);
    }

    #[test]
    fn remove_missing_path_errors() {
        let mut index = Index::new();
        index.add(entry("present", 1));

        assert!(index.remove(BStr::new("present")).is_ok());
        assert!(matches!(
            index.remove(BStr::new("present")).unwrap_err(),
            IndexError::NotInIndex(p) if p == "present"
        ));
        assert!(index.is_empty());
    }
}
