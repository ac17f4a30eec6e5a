//! Materializing stored trees back into the worktree.

use std::fs;
use std::path::Path;

use bstr::{BStr, ByteSlice};
use grit_hash::ObjectName;
use grit_index::{EntryFlags, Index, IndexEntry, StatData};
use grit_object::{EntryMode, Object};
use grit_odb::TreeWalker;

use crate::{RepoError, Repository};

impl Repository {
    /// Write every file of `root` into the worktree and reset the index
    /// to match.
    ///
    /// Existing files at the tree's paths are overwritten; files the tree
    /// does not know are left alone. Gitlink rows are recorded in the
    /// index but nothing is materialized for them.
    pub fn checkout_tree(&self, root: &ObjectName) -> Result<(), RepoError> {
        let work_tree = self.work_tree().ok_or(RepoError::Bare)?.to_path_buf();

        let mut index = Index::new();
        for walked in TreeWalker::new(self.objects(), root)? {
            let walked = walked?;

            if !walked.mode.is_gitlink() {
                let fs_path = work_tree.join(walked.path.to_str_lossy().as_ref());
                self.materialize(&fs_path, &walked.id, walked.mode)?;

                let meta = fs::symlink_metadata(&fs_path)?;
                index.add(IndexEntry {
                    path: walked.path,
                    id: walked.id,
                    mode: walked.mode,
                    stat: StatData::from_metadata(&meta),
                    flags: EntryFlags::default(),
                });
            } else {
                index.add(IndexEntry {
                    path: walked.path,
                    id: walked.id,
                    mode: walked.mode,
                    stat: StatData::default(),
                    flags: EntryFlags::default(),
                });
            }
        }

        self.write_index(&index)?;
        Ok(())
    }

    /// Rewrite one worktree path from its index entry.
    pub fn restore_path(&self, rel_path: &BStr) -> Result<(), RepoError> {
        let work_tree = self.work_tree().ok_or(RepoError::Bare)?.to_path_buf();
        let index = self.read_index()?;

        let entry = index.entry(rel_path).ok_or_else(|| {
            RepoError::Index(grit_index::IndexError::NotInIndex(rel_path.into()))
        })?;

        let fs_path = work_tree.join(rel_path.to_str_lossy().as_ref());
        self.materialize(&fs_path, &entry.id, entry.mode)
    }

    /// Put one blob's content at `fs_path` in the shape `mode` asks for.
    fn materialize(
        &self,
        fs_path: &Path,
        id: &ObjectName,
        mode: EntryMode,
    ) -> Result<(), RepoError> {
        let content = match self.objects().read_required(id)? {
            Object::Blob(content) => content,
            other => {
                return Err(RepoError::Odb(grit_odb::OdbError::Corrupt {
                    name: *id,
                    reason: format!("tree row names a {}", other.kind()),
                }))
            }
        };

        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if mode.is_symlink() {
            // Symlinks are replaced, never written through.
            match fs::symlink_metadata(fs_path) {
                Ok(_) => fs::remove_file(fs_path)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(RepoError::Io(e)),
            }
            #[cfg(unix)]
            {
                let target = content.to_str_lossy().into_owned();
                std::os::unix::fs::symlink(target, fs_path)?;
            }
            #[cfg(not(unix))]
            fs::write(fs_path, &content)?;
            return Ok(());
        }

        fs::write(fs_path, &content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let bits = if mode.is_file() && mode.permissions() & 0o111 != 0 {
                0o755
            } else {
                0o644
            };
            fs::set_permissions(fs_path, fs::Permissions::from_mode(bits))?;
        }

        Ok(())
    }
}
