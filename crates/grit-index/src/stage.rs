//! Worktree staging: hashing files into the store and recording them as
//! index entries.

use std::fs;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectName;
use grit_object::{EntryMode, ObjectKind};
use grit_odb::ObjectStore;

use crate::entry::{has_dot_git_component, EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError};

impl Index {
    /// Stage one worktree file or symlink.
    ///
    /// The blob is written to the store, then the entry replaces any
    /// previous entry at the same path. Paths with a `.git` component are
    /// skipped silently and report `Ok(None)`.
    pub fn add_file(
        &mut self,
        store: &ObjectStore,
        work_tree: &Path,
        rel_path: &BStr,
    ) -> Result<Option<ObjectName>, IndexError> {
        if has_dot_git_component(rel_path) {
            return Ok(None);
        }

        let fs_path = work_tree.join(rel_path.to_str_lossy().as_ref());
        let meta = fs::symlink_metadata(&fs_path)?;

        let (id, mode) = if meta.file_type().is_symlink() {
            let target = fs::read_link(&fs_path)?;
            let target_bytes = BString::from(target.to_string_lossy().as_bytes().to_vec());
            let id = store.write(ObjectKind::Blob, &target_bytes)?;
            (id, EntryMode::SYMLINK)
        } else {
            let content = fs::read(&fs_path)?;
            let id = store.write(ObjectKind::Blob, &content)?;
            (id, mode_for(&meta))
        };

        self.add(IndexEntry {
            path: BString::from(rel_path),
            id,
            mode,
            stat: StatData::from_metadata(&meta),
            flags: EntryFlags::default(),
        });
        Ok(Some(id))
    }

    /// Recursively stage every regular file and symlink under a worktree
    /// directory. Pass an empty path for the whole tree. Returns how many
    /// entries were staged.
    pub fn add_tree(
        &mut self,
        store: &ObjectStore,
        work_tree: &Path,
        rel_dir: &BStr,
    ) -> Result<usize, IndexError> {
        if has_dot_git_component(rel_dir) {
            return Ok(0);
        }

        let fs_dir = if rel_dir.is_empty() {
            work_tree.to_path_buf()
        } else {
            work_tree.join(rel_dir.to_str_lossy().as_ref())
        };

        let mut staged = 0;
        let mut names: Vec<BString> = Vec::new();
        for dirent in fs::read_dir(&fs_dir)? {
            let dirent = dirent?;
            names.push(BString::from(
                dirent.file_name().to_string_lossy().as_bytes().to_vec(),
            ));
        }
        names.sort();

        for file_name in names {
            if file_name == ".git" {
                continue;
            }
            let rel_child = join_rel(rel_dir, file_name.as_bstr());
            let fs_child = work_tree.join(rel_child.to_str_lossy().as_ref());
            let meta = fs::symlink_metadata(&fs_child)?;

            if meta.is_dir() {
                staged += self.add_tree(store, work_tree, rel_child.as_bstr())?;
            } else if meta.file_type().is_symlink() || meta.is_file() {
                if self
                    .add_file(store, work_tree, rel_child.as_bstr())?
                    .is_some()
                {
                    staged += 1;
                }
            }
            // Sockets, fifos, and devices are not stageable; skip them.
        }
        Ok(staged)
    }
}

fn join_rel(dir: &BStr, name: &BStr) -> BString {
    if dir.is_empty() {
        BString::from(name)
    } else {
        let mut path = BString::from(dir);
        path.push(b'/');
        path.extend_from_slice(name);
        path
    }
}

#[cfg(unix)]
fn mode_for(meta: &fs::Metadata) -> EntryMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        EntryMode::EXECUTABLE
    } else {
        EntryMode::REGULAR
    }
}

#[cfg(not(unix))]
fn mode_for(_meta: &fs::Metadata) -> EntryMode {
    EntryMode::REGULAR
}
