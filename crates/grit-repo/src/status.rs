//! Worktree status: three-way comparison of HEAD tree, index, and
//! working files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectName;
use grit_index::entry::has_dot_git_component;
use grit_index::Index;
use grit_object::{EntryMode, Object};
use grit_odb::TreeWalker;

use crate::{RepoError, Repository};

/// Classification of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// In the index, missing from the worktree.
    Removed,
    /// Worktree content or mode differs from the index.
    Modified,
    /// In the worktree, absent from the index.
    Untracked,
    /// In the index, absent from the HEAD tree.
    StagedAdded,
    /// Staged with content differing from the HEAD tree.
    StagedModified,
    /// In the HEAD tree, no longer in the index.
    StagedRemoved,
}

/// One row of the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: BString,
    pub status: Status,
    pub id: Option<ObjectName>,
}

impl Repository {
    /// Compute the status report, sorted by path.
    ///
    /// Three independent passes: index against worktree (with the stat
    /// fast path), worktree enumeration for untracked files, and HEAD
    /// tree against index for the staged half. A path can appear once
    /// per pass, e.g. both modified and staged-modified.
    pub fn status(&self) -> Result<Vec<StatusEntry>, RepoError> {
        let work_tree = self.work_tree().ok_or(RepoError::Bare)?.to_path_buf();
        let index = self.read_index()?;

        let mut report = Vec::new();
        self.worktree_pass(&work_tree, &index, &mut report)?;
        self.untracked_pass(&work_tree, &index, &mut report)?;
        self.staged_pass(&index, &mut report)?;

        report.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(report)
    }

    /// Index entries against the worktree.
    fn worktree_pass(
        &self,
        work_tree: &Path,
        index: &Index,
        report: &mut Vec<StatusEntry>,
    ) -> Result<(), RepoError> {
        for entry in index.iter() {
            let fs_path = work_tree.join(entry.path.to_str_lossy().as_ref());

            let meta = match fs::symlink_metadata(&fs_path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.push(StatusEntry {
                        path: entry.path.clone(),
                        status: Status::Removed,
                        id: Some(entry.id),
                    });
                    continue;
                }
                Err(e) => return Err(RepoError::Io(e)),
            };

            // Stat agreement means unchanged, no hashing needed.
            let mode_now = worktree_mode(&meta);
            if !entry.stat.differs_from(&meta) && mode_now == entry.mode {
                continue;
            }

            let actual = self.hash_worktree_file(&fs_path, &meta)?;
            if actual != entry.id || mode_now != entry.mode {
                report.push(StatusEntry {
                    path: entry.path.clone(),
                    status: Status::Modified,
                    id: Some(actual),
                });
            }
        }
        Ok(())
    }

    /// Worktree files with no index entry.
    fn untracked_pass(
        &self,
        work_tree: &Path,
        index: &Index,
        report: &mut Vec<StatusEntry>,
    ) -> Result<(), RepoError> {
        let mut files = Vec::new();
        collect_worktree_files(work_tree, BString::default(), &mut files)?;

        for path in files {
            if !index.contains(path.as_bstr()) {
                report.push(StatusEntry {
                    path,
                    status: Status::Untracked,
                    id: None,
                });
            }
        }
        Ok(())
    }

    /// HEAD tree against the index.
    fn staged_pass(&self, index: &Index, report: &mut Vec<StatusEntry>) -> Result<(), RepoError> {
        let mut head_paths: BTreeMap<BString, ObjectName> = BTreeMap::new();

        if let Some(commit_id) = self.head_commit()? {
            let tree = match self.objects().read_required(&commit_id)? {
                Object::Commit(commit) => commit.tree,
                other => {
                    return Err(RepoError::Odb(grit_odb::OdbError::Corrupt {
                        name: commit_id,
                        reason: format!("HEAD resolves to a {}", other.kind()),
                    }))
                }
            };
            for walked in TreeWalker::new(self.objects(), &tree)? {
                let walked = walked?;
                head_paths.insert(walked.path, walked.id);
            }
        }

        for (path, id) in &head_paths {
            match index.entry(path.as_bstr()) {
                None => report.push(StatusEntry {
                    path: path.clone(),
                    status: Status::StagedRemoved,
                    id: Some(*id),
                }),
                Some(entry) if entry.id != *id => report.push(StatusEntry {
                    path: path.clone(),
                    status: Status::StagedModified,
                    id: Some(entry.id),
                }),
                Some(_) => {}
            }
        }

        for entry in index.iter() {
            if !head_paths.contains_key(&entry.path) {
                report.push(StatusEntry {
                    path: entry.path.clone(),
                    status: Status::StagedAdded,
                    id: Some(entry.id),
                });
            }
        }
        Ok(())
    }

    /// Blob name of a worktree file, honoring symlinks.
    fn hash_worktree_file(
        &self,
        fs_path: &Path,
        meta: &fs::Metadata,
    ) -> Result<ObjectName, RepoError> {
        if meta.file_type().is_symlink() {
            let target = fs::read_link(fs_path)?;
            let bytes = target.to_string_lossy();
            Ok(grit_hash::hasher::hash_object("blob", bytes.as_bytes())?)
        } else {
            Ok(self.objects().hash_file(fs_path)?)
        }
    }
}

fn worktree_mode(meta: &fs::Metadata) -> EntryMode {
    if meta.file_type().is_symlink() {
        return EntryMode::SYMLINK;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 != 0 {
            return EntryMode::EXECUTABLE;
        }
    }
    EntryMode::REGULAR
}

/// Gather every regular file and symlink under `root`, repo-relative with
/// `/` separators, skipping any `.git` component.
fn collect_worktree_files(
    root: &Path,
    prefix: BString,
    out: &mut Vec<BString>,
) -> Result<(), RepoError> {
    let dir = if prefix.is_empty() {
        root.to_path_buf()
    } else {
        root.join(prefix.to_str_lossy().as_ref())
    };

    let mut names: Vec<BString> = Vec::new();
    for dirent in fs::read_dir(&dir)? {
        let dirent = dirent?;
        names.push(BString::from(
            dirent.file_name().to_string_lossy().as_bytes().to_vec(),
        ));
    }
    names.sort();

    for name in names {
        if name == ".git" {
            continue;
        }
        let rel = join(prefix.as_bstr(), name.as_bstr());
        if has_dot_git_component(&rel) {
            continue;
        }

        let meta = fs::symlink_metadata(root.join(rel.to_str_lossy().as_ref()))?;
        if meta.is_dir() {
            collect_worktree_files(root, rel, out)?;
        } else if meta.is_file() || meta.file_type().is_symlink() {
            out.push(rel);
        }
    }
    Ok(())
}

fn join(prefix: &BStr, name: &BStr) -> BString {
    if prefix.is_empty() {
        BString::from(name)
    } else {
        let mut path = BString::from(prefix);
        path.push(b'/');
        path.extend_from_slice(name);
        path
    }
}
