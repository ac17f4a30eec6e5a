//! Unified object store.
//!
//! One interface over both storage tiers: loose zlib files and packfiles
//! with delta compression. Reads dispatch loose first (a loose object may
//! be newer than a packed copy), then every discovered pack; delta chains
//! are resolved transparently, including ref-delta bases living in another
//! pack or in the loose tier. Writes always land in the loose tier.

mod prefix;
mod walk;

pub use prefix::resolve_prefix;
pub use walk::{lookup_path, TreeWalker, WalkEntry};

use std::cell::RefCell;
use std::io::Read;
use std::path::{Path, PathBuf};

use bstr::BString;
use grit_hash::{HashError, ObjectName};
use grit_loose::{LooseError, LooseStore, LooseStream};
use grit_object::cache::ObjectCache;
use grit_object::{Object, ObjectError, ObjectKind};
use grit_pack::{delta, PackError, PackFile, PackIndex};

/// Parsed objects kept hot between reads.
const CACHE_OBJECTS: usize = 1024;

/// Errors from the unified store.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectName),

    #[error("corrupt object {name}: {reason}")]
    Corrupt { name: ObjectName, reason: String },

    #[error("object {0} is not a tree")]
    NotATree(ObjectName),

    #[error("no file at path {path} in tree")]
    NoFileInTree { path: BString },

    #[error("path {path} names a tree, not a file")]
    EntryIsTree { path: BString },

    #[error("invalid object name prefix: {0:?}")]
    InvalidPrefix(String),

    #[error("no object matches prefix {0}")]
    PrefixNotFound(String),

    #[error("prefix {0} matches more than one object")]
    AmbiguousPrefix(String),

    #[error(transparent)]
    Loose(#[from] LooseError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct PackPair {
    index: PackIndex,
    pack: PackFile,
}

/// The unified object store for one repository.
///
/// Single-owner by construction: the pack handles it holds are
/// seek-stateful and the cache is behind a `RefCell`, so a store instance
/// belongs to one thread.
pub struct ObjectStore {
    loose: LooseStore,
    packs: Vec<PackPair>,
    cache: RefCell<ObjectCache>,
    objects_dir: PathBuf,
}

impl ObjectStore {
    /// Open the store rooted at an `objects/` directory, discovering every
    /// usable `.idx`/`.pack` pair under `objects/pack/`.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let packs = discover_packs(&objects_dir)?;
        Ok(Self {
            loose: LooseStore::open(&objects_dir),
            packs,
            cache: RefCell::new(ObjectCache::new(CACHE_OBJECTS)),
            objects_dir,
        })
    }

    /// The `objects/` directory this store serves.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Number of packs in use.
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Re-scan `objects/pack/` after packs were added or removed.
    pub fn refresh_packs(&mut self) -> Result<(), OdbError> {
        self.packs = discover_packs(&self.objects_dir)?;
        Ok(())
    }

    /// Store a payload of the given kind, returning its name.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectName, OdbError> {
        Ok(self.loose.write(kind, payload)?)
    }

    /// Store a parsed object.
    pub fn write_object(&self, obj: &Object) -> Result<ObjectName, OdbError> {
        Ok(self.loose.write_object(obj)?)
    }

    /// Hash a worktree file with blob framing, without storing anything.
    pub fn hash_file(&self, path: impl AsRef<Path>) -> Result<ObjectName, OdbError> {
        Ok(grit_hash::hasher::hash_file(path)?)
    }

    /// Whether either tier holds the object. Pack lookups stay in the
    /// index; nothing is inflated.
    pub fn contains(&self, name: &ObjectName) -> bool {
        if self.loose.contains(name) {
            return true;
        }
        self.packs
            .iter()
            .any(|pair| matches!(pair.index.find(name), Ok(Some(_))))
    }

    /// Read and parse an object from either tier. Missing is `Ok(None)`.
    pub fn read(&self, name: &ObjectName) -> Result<Option<Object>, OdbError> {
        if let Some(obj) = self.loose.read(name)? {
            return Ok(Some(obj));
        }
        match self.read_packed(name)? {
            Some((kind, payload)) => {
                let obj =
                    Object::parse_payload(kind, &payload).map_err(|e| OdbError::Corrupt {
                        name: *name,
                        reason: e.to_string(),
                    })?;
                Ok(Some(obj))
            }
            None => Ok(None),
        }
    }

    /// Read through the parsed-object cache.
    pub fn read_cached(&self, name: &ObjectName) -> Result<Option<Object>, OdbError> {
        if let Some(obj) = self.cache.borrow_mut().get(name) {
            return Ok(Some(obj.clone()));
        }
        let obj = self.read(name)?;
        if let Some(ref obj) = obj {
            self.cache.borrow_mut().insert(*name, obj.clone());
        }
        Ok(obj)
    }

    /// Read an object that must exist.
    pub fn read_required(&self, name: &ObjectName) -> Result<Object, OdbError> {
        self.read_cached(name)?.ok_or(OdbError::NotFound(*name))
    }

    /// Kind and payload size without materializing loose payloads.
    pub fn read_header(
        &self,
        name: &ObjectName,
    ) -> Result<Option<(ObjectKind, u64)>, OdbError> {
        if let Some((kind, size)) = self.loose.read_header(name)? {
            return Ok(Some((kind, size as u64)));
        }
        match self.read_packed(name)? {
            Some((kind, payload)) => Ok(Some((kind, payload.len() as u64))),
            None => Ok(None),
        }
    }

    /// Open a payload reader. Missing is `Ok(None)`.
    ///
    /// Loose objects stream straight from the inflater. Packed objects are
    /// materialized first: applying a delta chain needs the whole base in
    /// hand anyway.
    pub fn open_reader(&self, name: &ObjectName) -> Result<Option<ObjectReader>, OdbError> {
        if let Some(stream) = self.loose.stream(name)? {
            return Ok(Some(ObjectReader {
                kind: stream.kind(),
                size: stream.size() as u64,
                source: ReaderSource::Loose(stream),
            }));
        }
        match self.read_packed(name)? {
            Some((kind, payload)) => Ok(Some(ObjectReader {
                kind,
                size: payload.len() as u64,
                source: ReaderSource::Packed(std::io::Cursor::new(payload)),
            })),
            None => Ok(None),
        }
    }

    /// Iterate every object name in the loose tier.
    pub fn loose_names(&self) -> grit_loose::LooseIter {
        self.loose.iter()
    }

    /// The open pack index and pack pairs, for scans that need both.
    pub(crate) fn pack_indexes(&self) -> impl Iterator<Item = (&PackIndex, &PackFile)> {
        self.packs.iter().map(|pair| (&pair.index, &pair.pack))
    }

    /// Search every pack for `name` and resolve whatever delta chain hangs
    /// off it.
    fn read_packed(&self, name: &ObjectName) -> Result<Option<(ObjectKind, Vec<u8>)>, OdbError> {
        for (skip, pair) in self.packs.iter().enumerate() {
            let Some(offset) = pair.index.find(name)? else {
                continue;
            };
            let resolved = delta::resolve(
                &pair.pack,
                offset,
                |base| pair.index.find(base).ok().flatten(),
                |base| self.fetch_base_elsewhere(skip, base),
            )?;
            return Ok(Some(resolved));
        }
        Ok(None)
    }

    /// Fetch a ref-delta base that is not in the pack being read: loose
    /// tier first, then any other pack. Inner chains may lean on loose
    /// bases again, but not on a third pack.
    fn fetch_base_elsewhere(
        &self,
        skip: usize,
        base: &ObjectName,
    ) -> Option<(ObjectKind, Vec<u8>)> {
        if let Ok(Some(obj)) = self.loose.read(base) {
            return Some((obj.kind(), obj.payload()));
        }
        for (i, pair) in self.packs.iter().enumerate() {
            if i == skip {
                continue;
            }
            let Ok(Some(offset)) = pair.index.find(base) else {
                continue;
            };
            let fetched = delta::resolve(
                &pair.pack,
                offset,
                |n| pair.index.find(n).ok().flatten(),
                |n| {
                    self.loose
                        .read(n)
                        .ok()
                        .flatten()
                        .map(|obj| (obj.kind(), obj.payload()))
                },
            );
            if let Ok(resolved) = fetched {
                return Some(resolved);
            }
        }
        None
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("objects_dir", &self.objects_dir)
            .field("packs", &self.packs.len())
            .finish_non_exhaustive()
    }
}

/// Scan `objects/pack/` for `.idx` files with a `.pack` sibling.
///
/// Pairs that fail to open, or whose index cannot serve lookups (the
/// legacy v1 layout), are skipped rather than wedging every read.
fn discover_packs(objects_dir: &Path) -> Result<Vec<PackPair>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    for dirent in std::fs::read_dir(&pack_dir)? {
        let idx_path = dirent?.path();
        if !idx_path.extension().is_some_and(|ext| ext == "idx") {
            continue;
        }
        let pack_path = idx_path.with_extension("pack");
        if !pack_path.is_file() {
            continue;
        }
        let Ok(index) = PackIndex::open(&idx_path) else {
            continue;
        };
        if index.version() != grit_pack::INDEX_VERSION {
            continue;
        }
        let Ok(pack) = PackFile::open(&pack_path) else {
            continue;
        };
        if pack.object_count() != index.count() {
            continue;
        }
        pairs.push(PackPair { index, pack });
    }
    Ok(pairs)
}

enum ReaderSource {
    Loose(LooseStream),
    Packed(std::io::Cursor<Vec<u8>>),
}

/// Streaming payload reader handed out by [`ObjectStore::open_reader`].
pub struct ObjectReader {
    kind: ObjectKind,
    size: u64,
    source: ReaderSource,
}

impl ObjectReader {
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Drain the reader and parse the payload.
    pub fn into_object(mut self) -> Result<Object, OdbError> {
        let mut payload = Vec::with_capacity(self.size.min(1 << 24) as usize);
        self.read_to_end(&mut payload)?;
        Ok(Object::parse_payload(self.kind, &payload)?)
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.source {
            ReaderSource::Loose(stream) => stream.read(buf),
            ReaderSource::Packed(cursor) => cursor.read(buf),
        }
    }
}
