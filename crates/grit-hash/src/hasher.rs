//! Streaming SHA-1 with collision detection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::{HashError, ObjectName};

/// Buffer size for streaming file hashes.
const STREAM_BUF: usize = 4096;

/// Incremental SHA-1 computation.
///
/// Wraps the collision-detecting SHA-1 implementation. Data is fed with
/// [`update`](Hasher::update) or through the [`std::io::Write`] impl and
/// finalised into an [`ObjectName`]. A detected collision attack surfaces
/// as an error instead of a silently wrong name.
pub struct Hasher {
    inner: Box<sha1_checked::Sha1>,
}

impl Hasher {
    /// Start a fresh digest.
    pub fn new() -> Self {
        use digest::Digest;
        Self {
            inner: Box::new(sha1_checked::Sha1::new()),
        }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        use digest::Digest;
        self.inner.update(data);
    }

    /// Finish and return the object name.
    pub fn finalize(self) -> Result<ObjectName, HashError> {
        let result = self.inner.try_finalize();
        if result.has_collision() {
            return Err(HashError::Collision);
        }
        ObjectName::from_bytes(result.hash().as_slice())
    }

    /// Hash a byte slice in one call.
    pub fn digest(data: &[u8]) -> Result<ObjectName, HashError> {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Hash an object payload with its frame: `"<kind> <len>\0<payload>"`.
pub fn hash_object(kind: &str, payload: &[u8]) -> Result<ObjectName, HashError> {
    let mut h = Hasher::new();
    h.update(format!("{} {}\0", kind, payload.len()).as_bytes());
    h.update(payload);
    h.finalize()
}

/// Hash a file's content as a blob without storing it.
///
/// The frame size is the file's length at open time; the caller ensures the
/// file is quiescent while it streams through the digest.
pub fn hash_file(path: impl AsRef<Path>) -> Result<ObjectName, HashError> {
    let path = path.as_ref();
    let io_err = |source| HashError::HashFile {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();

    let mut h = Hasher::new();
    h.update(format!("blob {len}\0").as_bytes());

    let mut buf = [0u8; STREAM_BUF];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    h.finalize()
}
