//! Index entry model, mirroring the on-disk fields.

use bstr::{BString, ByteSlice};
use grit_hash::ObjectName;
use grit_object::EntryMode;

/// Maximum value the 12-bit name-length field can carry.
pub(crate) const NAME_LENGTH_CAP: usize = 0xfff;

/// One index entry: a path, the staged blob, and cached stat data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Repo-relative path, POSIX separators, no trailing NUL.
    pub path: BString,
    /// Name of the staged blob.
    pub id: ObjectName,
    /// Mode word (type nibble plus permissions).
    pub mode: EntryMode,
    pub stat: StatData,
    pub flags: EntryFlags,
}

/// Filesystem metadata cached per entry for cheap change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatData {
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: (meta.ctime_nsec() as u32) % 1_000_000_000,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: (meta.mtime_nsec() as u32) % 1_000_000_000,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::time::UNIX_EPOCH;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            dev: 0,
            ino: 0,
            uid: 0,
            gid: 0,
            size: meta.len() as u32,
        }
    }

    /// Whether fresh metadata differs from the cached snapshot on any of
    /// ctime, mtime, dev, ino, or size. Agreement on all of them is the
    /// no-rehash fast path.
    pub fn differs_from(&self, meta: &std::fs::Metadata) -> bool {
        let fresh = Self::from_metadata(meta);
        self.ctime_secs != fresh.ctime_secs
            || self.ctime_nsecs != fresh.ctime_nsecs
            || self.mtime_secs != fresh.mtime_secs
            || self.mtime_nsecs != fresh.mtime_nsecs
            || self.dev != fresh.dev
            || self.ino != fresh.ino
            || self.size != fresh.size
    }
}

/// Decoded entry flag word (plus the v3 extended word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    /// Bit 15: trust the cached stat data unconditionally.
    pub assume_valid: bool,
    /// Bits 12..14: merge stage.
    pub stage: u8,
    /// Extended bit 13: placeholder entry, content not yet staged.
    pub intent_to_add: bool,
    /// Extended bit 14: do not materialize in the worktree.
    pub skip_worktree: bool,
}

impl EntryFlags {
    /// True when serializing needs the extended flag word (version 3).
    pub fn has_extended(&self) -> bool {
        self.intent_to_add || self.skip_worktree
    }
}

/// True when any path component is exactly `.git`.
pub fn has_dot_git_component(path: &[u8]) -> bool {
    path.split_str("/").any(|component| component == b".git")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_git_detection() {
        assert!(has_dot_git_component(b".git"));
        assert!(has_dot_git_component(b".git/config"));
        assert!(has_dot_git_component(b"a/.git/b"));
        assert!(has_dot_git_component(b"a/b/.git"));
        assert!(!has_dot_git_component(b".gitignore"));
        assert!(!has_dot_git_component(b"a/.gitmodules"));
        assert!(!has_dot_git_component(b"git/file"));
    }

    #[test]
    fn flags_extended_detection() {
        assert!(!EntryFlags::default().has_extended());
        assert!(EntryFlags {
            intent_to_add: true,
            ..Default::default()
        }
        .has_extended());
        assert!(EntryFlags {
            skip_worktree: true,
            ..Default::default()
        }
        .has_extended());
        assert!(!EntryFlags {
            assume_valid: true,
            stage: 2,
            ..Default::default()
        }
        .has_extended());
    }
}
