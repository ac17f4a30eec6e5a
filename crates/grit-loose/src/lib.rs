//! Loose object storage.
//!
//! Each object lives at `objects/XX/YYYY...` where `XX` is the hex of the
//! first digest byte. The file holds the zlib-compressed framed form,
//! `"<kind> <size>\0<payload>"`. Writes are hash-first and idempotent;
//! reads come back as parsed objects or as a payload stream.

mod enumerate;
mod read;
mod stream;
mod write;

pub use enumerate::LooseIter;
pub use stream::LooseStream;

use std::path::{Path, PathBuf};

use grit_hash::ObjectName;

/// Staging buffer size for header sniffing and drain loops.
pub(crate) const STAGE_BUF: usize = 4096;

/// Errors from the loose tier.
#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("corrupt loose object {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("unable to inflate loose object {name}")]
    Inflate {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] grit_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

/// Handle to a loose object directory.
pub struct LooseStore {
    objects_dir: PathBuf,
    level: flate2::Compression,
}

impl LooseStore {
    /// Open the loose tier rooted at `objects_dir`.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            level: flate2::Compression::default(),
        }
    }

    /// Override the zlib compression level (0 to 9).
    pub fn set_compression_level(&mut self, level: u32) {
        self.level = flate2::Compression::new(level);
    }

    /// The objects directory this store serves.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// File path a given object name maps to.
    pub fn object_path(&self, name: &ObjectName) -> PathBuf {
        self.objects_dir.join(name.loose_path())
    }

    /// Whether the object exists in the loose tier.
    pub fn contains(&self, name: &ObjectName) -> bool {
        self.object_path(name).is_file()
    }
}
