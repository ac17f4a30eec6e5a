use std::fs;
use std::path::{Path, PathBuf};

use crate::RepoError;

/// The branch HEAD points at in a fresh repository.
pub const DEFAULT_BRANCH: &str = "main";

/// Create the repository directory skeleton.
///
/// Layout: `HEAD` symbolic to the default branch, `objects/{info,pack}`,
/// `refs/{heads,tags}`, plus the config and description stubs. For a
/// non-bare repository everything lands under `<path>/.git`. Running init
/// on an existing repository changes nothing.
///
/// Returns `(git_dir, work_tree)`.
pub(crate) fn init_layout(
    path: &Path,
    bare: bool,
) -> Result<(PathBuf, Option<PathBuf>), RepoError> {
    let (git_dir, work_tree) = if bare {
        (path.to_path_buf(), None)
    } else {
        (path.join(".git"), Some(path.to_path_buf()))
    };

    if git_dir.join("HEAD").is_file() {
        return Ok((git_dir, work_tree));
    }

    fs::create_dir_all(git_dir.join("objects").join("info"))?;
    fs::create_dir_all(git_dir.join("objects").join("pack"))?;
    fs::create_dir_all(git_dir.join("refs").join("heads"))?;
    fs::create_dir_all(git_dir.join("refs").join("tags"))?;

    fs::write(
        git_dir.join("HEAD"),
        format!("ref: refs/heads/{DEFAULT_BRANCH}\n"),
    )?;

    let config = if bare {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = true\n"
    } else {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = false\n"
    };
    fs::write(git_dir.join("config"), config)?;
    fs::write(
        git_dir.join("description"),
        "Unnamed repository; edit this file 'description' to name the repository.\n",
    )?;

    Ok((git_dir, work_tree))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let (git_dir, work_tree) = init_layout(dir.path(), false).unwrap();

        assert_eq!(git_dir, dir.path().join(".git"));
        assert_eq!(work_tree.as_deref(), Some(dir.path()));

        assert_eq!(
            fs::read_to_string(git_dir.join("HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
        assert!(git_dir.join("objects/info").is_dir());
        assert!(git_dir.join("objects/pack").is_dir());
        assert!(git_dir.join("refs/heads").is_dir());
        assert!(git_dir.join("refs/tags").is_dir());
        assert!(git_dir.join("config").is_file());
    }

    #[test]
    fn bare_layout_has_no_dot_git() {
        let dir = tempfile::tempdir().unwrap();
        let (git_dir, work_tree) = init_layout(dir.path(), true).unwrap();

        assert_eq!(git_dir, dir.path());
        assert!(work_tree.is_none());
        assert!(dir.path().join("objects").is_dir());
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    fn reinit_leaves_existing_state_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (git_dir, _) = init_layout(dir.path(), false).unwrap();

        fs::write(git_dir.join("HEAD"), "ref: refs/heads/other\n").unwrap();
        init_layout(dir.path(), false).unwrap();

        assert_eq!(
            fs::read_to_string(git_dir.join("HEAD")).unwrap(),
            "ref: refs/heads/other\n"
        );
    }
}
