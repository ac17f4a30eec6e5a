//! The reference namespace.
//!
//! A ref is a text file under the repository directory holding either a
//! 40-hex object name or `"ref: <target>\n"`. Short names expand before
//! any file is touched: `HEAD` and anything under `refs/` pass through,
//! a bare name lands under `refs/heads/`, and everything else is invalid.

mod files;

use std::path::{Path, PathBuf};

use grit_hash::{HashError, ObjectName};
use grit_utils::LockError;

/// Maximum symbolic hops a resolve will follow.
pub const MAX_SYMREF_DEPTH: usize = 10;

/// Errors from ref operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("symbolic ref chain from {name} exceeds {limit} hops")]
    DepthExceeded { name: String, limit: usize },

    #[error("malformed ref {name}: {reason}")]
    Parse { name: String, reason: String },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A ref's stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    /// Points straight at an object.
    Direct(ObjectName),
    /// Points at another ref by full name.
    Symbolic(String),
}

impl Ref {
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Ref::Symbolic(_))
    }

    /// The object name, when direct.
    pub fn target(&self) -> Option<ObjectName> {
        match self {
            Ref::Direct(id) => Some(*id),
            Ref::Symbolic(_) => None,
        }
    }
}

/// Expand a short ref name to its full form.
pub fn expand_name(name: &str) -> Result<String, RefError> {
    validate_name(name)?;
    if name == "HEAD" || name.starts_with("refs/") {
        Ok(name.to_string())
    } else if !name.contains('/') {
        Ok(format!("refs/heads/{name}"))
    } else {
        Err(RefError::InvalidRef(name.to_string()))
    }
}

/// Reject names that could not name a ref file: empty names or
/// components, dot and dot-dot components, and control bytes.
fn validate_name(name: &str) -> Result<(), RefError> {
    let invalid = || RefError::InvalidRef(name.to_string());
    if name.is_empty() {
        return Err(invalid());
    }
    if name
        .bytes()
        .any(|b| b < 0x20 || b == 0x7f || b == b' ' || b == b'\\' || b == b':')
    {
        return Err(invalid());
    }
    for component in name.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(invalid());
        }
        if component.ends_with(".lock") {
            return Err(invalid());
        }
    }
    Ok(())
}

/// The file-backed ref store for one repository directory.
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Serve refs under the given repository directory.
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Read a ref's stored value. Missing is `Ok(None)`.
    pub fn read(&self, name: &str) -> Result<Option<Ref>, RefError> {
        let full = expand_name(name)?;
        files::read_ref(&self.git_dir, &full)
    }

    /// Follow the symbolic chain from `name` to an object name.
    ///
    /// A missing ref anywhere along the chain is `Ok(None)`; more than
    /// [`MAX_SYMREF_DEPTH`] symbolic hops is an error, which also breaks
    /// reference cycles.
    pub fn resolve(&self, name: &str) -> Result<Option<ObjectName>, RefError> {
        let mut current = expand_name(name)?;
        for _ in 0..=MAX_SYMREF_DEPTH {
            match files::read_ref(&self.git_dir, &current)? {
                None => return Ok(None),
                Some(Ref::Direct(id)) => return Ok(Some(id)),
                Some(Ref::Symbolic(target)) => current = expand_name(&target)?,
            }
        }
        Err(RefError::DepthExceeded {
            name: expand_name(name)?,
            limit: MAX_SYMREF_DEPTH,
        })
    }

    /// Atomically rewrite a ref.
    ///
    /// Symbolic targets are expanded before storing, so the file always
    /// holds a full name.
    pub fn update(&self, name: &str, value: &Ref) -> Result<(), RefError> {
        let full = expand_name(name)?;
        match value {
            Ref::Direct(id) => files::write_ref(&self.git_dir, &full, id),
            Ref::Symbolic(target) => {
                let target = expand_name(target)?;
                files::write_symbolic_ref(&self.git_dir, &full, &target)
            }
        }
    }

    /// Delete a ref file, pruning directories it leaves empty.
    pub fn delete(&self, name: &str) -> Result<(), RefError> {
        let full = expand_name(name)?;
        files::delete_ref(&self.git_dir, &full)
    }

    /// All branch names, sorted.
    pub fn list_heads(&self) -> Result<Vec<String>, RefError> {
        files::enumerate(&self.git_dir, "refs/heads")
    }

    /// Every name under `refs/`, sorted.
    pub fn list_all(&self) -> Result<Vec<String>, RefError> {
        files::enumerate(&self.git_dir, "refs")
    }
}

impl std::fmt::Debug for RefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefStore")
            .field("git_dir", &self.git_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_rules() {
        assert_eq!(expand_name("HEAD").unwrap(), "HEAD");
        assert_eq!(expand_name("refs/heads/main").unwrap(), "refs/heads/main");
        assert_eq!(expand_name("refs/tags/v1").unwrap(), "refs/tags/v1");
        assert_eq!(expand_name("main").unwrap(), "refs/heads/main");
        assert_eq!(expand_name("v1.2").unwrap(), "refs/heads/v1.2");
    }

    #[test]
    fn expansion_rejections() {
        for bad in [
            "",
            "heads/main",
            "foo/bar",
            "refs/../../etc/passwd",
            "refs//double",
            "refs/heads/",
            "na me",
            "tab\tname",
            "refs/heads/x.lock",
        ] {
            assert!(
                matches!(expand_name(bad), Err(RefError::InvalidRef(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn ref_value_accessors() {
        let id = ObjectName::new([1; 20]);
        assert_eq!(Ref::Direct(id).target(), Some(id));
        assert!(!Ref::Direct(id).is_symbolic());

        let sym = Ref::Symbolic("refs/heads/main".into());
        assert!(sym.is_symbolic());
        assert_eq!(sym.target(), None);
    }
}
