//! Repository facade: ties the object store, ref store, and index
//! together, and carries the commit and status plumbing on top of them.

mod checkout;
mod init;
mod status;

pub use init::DEFAULT_BRANCH;
pub use status::{Status, StatusEntry};

use std::path::{Path, PathBuf};

use bstr::BString;
use grit_hash::{HashError, ObjectName};
use grit_index::{Index, IndexError};
use grit_object::{Commit, ObjectError, ObjectKind, Signature, Tag};
use grit_odb::{ObjectStore, OdbError};
use grit_ref::{Ref, RefError, RefStore};

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a repository: {0}")]
    NotARepository(PathBuf),

    #[error("operation requires a work tree, repository is bare")]
    Bare,

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An opened repository.
pub struct Repository {
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
    store: ObjectStore,
    refs: RefStore,
}

impl Repository {
    /// Create a repository with a work tree at `path` and open it.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let (git_dir, work_tree) = init::init_layout(path.as_ref(), false)?;
        Self::from_dirs(git_dir, work_tree)
    }

    /// Create a bare repository at `path` and open it.
    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let (git_dir, work_tree) = init::init_layout(path.as_ref(), true)?;
        Self::from_dirs(git_dir, work_tree)
    }

    /// Open an existing repository.
    ///
    /// `path` may be a work tree root (holding `.git/`) or a repository
    /// directory itself (holding `HEAD` and `objects/`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        if path.join(".git").join("HEAD").is_file() {
            Self::from_dirs(path.join(".git"), Some(path.to_path_buf()))
        } else if path.join("HEAD").is_file() && path.join("objects").is_dir() {
            Self::from_dirs(path.to_path_buf(), None)
        } else {
            Err(RepoError::NotARepository(path.to_path_buf()))
        }
    }

    fn from_dirs(git_dir: PathBuf, work_tree: Option<PathBuf>) -> Result<Self, RepoError> {
        let store = ObjectStore::open(git_dir.join("objects"))?;
        let refs = RefStore::new(&git_dir);
        Ok(Self {
            git_dir,
            work_tree,
            store,
            refs,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The work tree root; `None` for bare repositories.
    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.work_tree.is_none()
    }

    /// The object store.
    pub fn objects(&self) -> &ObjectStore {
        &self.store
    }

    /// The ref store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    /// Read the index; a repository without one yet reads as empty.
    pub fn read_index(&self) -> Result<Index, RepoError> {
        Ok(Index::load(self.index_path())?)
    }

    /// Atomically rewrite the index file.
    pub fn write_index(&self, index: &Index) -> Result<(), RepoError> {
        Ok(index.write_to(self.index_path())?)
    }

    /// The full ref name HEAD points at, or `None` when HEAD is detached.
    ///
    /// The symbolic target comes back whole, whatever namespace it lives
    /// in; callers wanting a branch's short name strip `refs/heads/` only
    /// when it is actually present.
    pub fn head_name(&self) -> Result<Option<String>, RepoError> {
        match self.refs.read("HEAD")? {
            Some(Ref::Symbolic(target)) => Ok(Some(target)),
            _ => Ok(None),
        }
    }

    /// The commit HEAD resolves to; `None` on an unborn branch.
    pub fn head_commit(&self) -> Result<Option<ObjectName>, RepoError> {
        Ok(self.refs.resolve("HEAD")?)
    }

    /// Commit the current index.
    ///
    /// The index becomes a tree, the tree a commit whose parent is the
    /// resolved HEAD (none on an unborn branch). The branch HEAD names is
    /// then moved; with a detached HEAD the object name is written to
    /// HEAD itself.
    pub fn commit(
        &self,
        message: impl Into<BString>,
        author: Signature,
        committer: Signature,
    ) -> Result<ObjectName, RepoError> {
        let index = self.read_index()?;
        let tree = grit_index::index_to_tree(&index, &self.store)?;

        let commit = Commit {
            tree,
            parents: self.head_commit()?.into_iter().collect(),
            author,
            committer,
            gpgsig: None,
            message: message.into(),
        };
        let id = self.store.write(ObjectKind::Commit, &commit.serialize())?;

        match self.refs.read("HEAD")? {
            Some(Ref::Symbolic(branch)) => self.refs.update(&branch, &Ref::Direct(id))?,
            _ => self.refs.update("HEAD", &Ref::Direct(id))?,
        }
        Ok(id)
    }

    /// Create an annotated tag for `target` and point `refs/tags/<name>`
    /// at the tag object. Returns the tag object's name.
    pub fn tag(
        &self,
        name: &str,
        target: ObjectName,
        tagger: Signature,
        message: impl Into<BString>,
    ) -> Result<ObjectName, RepoError> {
        let Some((target_kind, _)) = self.store.read_header(&target)? else {
            return Err(RepoError::Odb(OdbError::NotFound(target)));
        };

        let tag = Tag {
            target,
            target_kind,
            tag_name: BString::from(name),
            tagger: Some(tagger),
            message: message.into(),
            gpgsig: None,
        };
        let id = self.store.write(ObjectKind::Tag, &tag.serialize())?;
        self.refs
            .update(&format!("refs/tags/{name}"), &Ref::Direct(id))?;
        Ok(id)
    }

    /// Point `refs/tags/<name>` straight at an object, no tag object.
    pub fn lightweight_tag(&self, name: &str, target: ObjectName) -> Result<(), RepoError> {
        Ok(self
            .refs
            .update(&format!("refs/tags/{name}"), &Ref::Direct(target))?)
    }

    /// Create or move `refs/heads/<name>`.
    pub fn create_branch(&self, name: &str, target: ObjectName) -> Result<(), RepoError> {
        Ok(self
            .refs
            .update(&format!("refs/heads/{name}"), &Ref::Direct(target))?)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .finish_non_exhaustive()
    }
}
