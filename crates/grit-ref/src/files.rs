//! Loose ref files: one text line per ref under the repository directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use grit_hash::ObjectName;
use grit_utils::LockFile;

use crate::{Ref, RefError};

fn ref_path(git_dir: &Path, full_name: &str) -> PathBuf {
    git_dir.join(full_name)
}

/// Read and classify a ref file. Missing is `Ok(None)`.
pub(crate) fn read_ref(git_dir: &Path, full_name: &str) -> Result<Option<Ref>, RefError> {
    let content = match fs::read_to_string(ref_path(git_dir, full_name)) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RefError::Io(e)),
    };
    let line = content.trim_end_matches(['\n', '\r']).trim();

    if let Some(target) = line.strip_prefix("ref: ") {
        return Ok(Some(Ref::Symbolic(target.trim().to_string())));
    }

    let id = ObjectName::from_hex(line).map_err(|_| RefError::Parse {
        name: full_name.to_string(),
        reason: format!("neither a symbolic ref nor 40 hex digits: {line:?}"),
    })?;
    Ok(Some(Ref::Direct(id)))
}

/// Atomically write a direct ref: `"<hex>\n"`.
pub(crate) fn write_ref(
    git_dir: &Path,
    full_name: &str,
    id: &ObjectName,
) -> Result<(), RefError> {
    write_ref_content(git_dir, full_name, &format!("{}\n", id.to_hex()))
}

/// Atomically write a symbolic ref: `"ref: <full-target>\n"`.
pub(crate) fn write_symbolic_ref(
    git_dir: &Path,
    full_name: &str,
    target: &str,
) -> Result<(), RefError> {
    write_ref_content(git_dir, full_name, &format!("ref: {target}\n"))
}

fn write_ref_content(git_dir: &Path, full_name: &str, content: &str) -> Result<(), RefError> {
    let path = ref_path(git_dir, full_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut lock = LockFile::acquire(&path)?;
    lock.write_all(content.as_bytes())?;
    lock.commit()?;
    Ok(())
}

/// Remove a ref file, then prune directories it leaves empty (stopping at
/// `refs/` and the repository directory itself).
pub(crate) fn delete_ref(git_dir: &Path, full_name: &str) -> Result<(), RefError> {
    let path = ref_path(git_dir, full_name);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RefError::NotFound(full_name.to_string()))
        }
        Err(e) => return Err(RefError::Io(e)),
    }

    let refs_root = git_dir.join("refs");
    let mut dir = path.parent().map(Path::to_path_buf);
    while let Some(d) = dir {
        if d == refs_root || d == *git_dir {
            break;
        }
        let empty = d
            .read_dir()
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !empty {
            break;
        }
        let _ = fs::remove_dir(&d);
        dir = d.parent().map(Path::to_path_buf);
    }
    Ok(())
}

/// Collect every ref name under `subdir` (e.g. `"refs"` or
/// `"refs/heads"`), sorted lexicographically by full name.
pub(crate) fn enumerate(git_dir: &Path, subdir: &str) -> Result<Vec<String>, RefError> {
    let root = git_dir.join(subdir);
    let mut names = Vec::new();
    if root.is_dir() {
        collect(git_dir, &root, &mut names)?;
    }
    names.sort();
    Ok(names)
}

fn collect(git_dir: &Path, dir: &Path, names: &mut Vec<String>) -> Result<(), RefError> {
    for dirent in fs::read_dir(dir)? {
        let path = dirent?.path();
        if path.is_dir() {
            collect(git_dir, &path, names)?;
            continue;
        }

        let Ok(relative) = path.strip_prefix(git_dir) else {
            continue;
        };
        let Some(name) = relative.to_str() else {
            continue;
        };
        // Leftover lock files are not refs.
        if name.ends_with(".lock") {
            continue;
        }
        names.push(name.replace(std::path::MAIN_SEPARATOR, "/"));
    }
    Ok(())
}
