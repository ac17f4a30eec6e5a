//! Pack index reading and fan-out assisted lookup.
//!
//! v2 layout:
//!
//! ```text
//! magic "\xfftOc" | version 2
//! 256 x u32 cumulative fan-out counts
//! N x 20-byte object names, sorted
//! N x u32 CRC-32 of the raw entry bytes
//! N x u32 offsets (bit 31 set: low 31 bits index the u64 table)
//! M x u64 large offsets
//! 20-byte pack checksum | 20-byte index checksum
//! ```
//!
//! A file without the magic is the legacy v1 layout (fan-out, then
//! interleaved offset/name rows). It opens, so its object count is still
//! reportable, but lookups are refused.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use grit_hash::{ObjectName, NAME_LEN};
use memmap2::Mmap;

use crate::{PackError, INDEX_MAGIC, INDEX_VERSION};

const FANOUT_BYTES: usize = 256 * 4;
const V2_HEADER: usize = 8;

/// A memory-mapped pack index.
pub struct PackIndex {
    map: Mmap,
    path: PathBuf,
    version: u32,
    count: u32,
    names_start: usize,
    crcs_start: usize,
    offsets_start: usize,
    large_start: usize,
}

impl PackIndex {
    /// Open an `.idx` file, classifying it as v1 or v2 by its magic.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        let map = unsafe { Mmap::map(&file)? };

        if map.len() >= 4 && map[..4] == INDEX_MAGIC {
            let version = be_u32(&map[4..8]);
            if version != INDEX_VERSION {
                return Err(PackError::UnsupportedIndexVersion(version));
            }
            Self::open_v2(map, path)
        } else {
            Self::open_v1(map, path)
        }
    }

    fn open_v2(map: Mmap, path: PathBuf) -> Result<Self, PackError> {
        if map.len() < V2_HEADER + FANOUT_BYTES + 2 * NAME_LEN {
            return Err(PackError::Index("v2 index too small".into()));
        }

        let count = be_u32(&map[V2_HEADER + 255 * 4..]);
        let n = count as usize;

        let names_start = V2_HEADER + FANOUT_BYTES;
        let crcs_start = names_start + n * NAME_LEN;
        let offsets_start = crcs_start + n * 4;
        let large_start = offsets_start + n * 4;

        if map.len() < large_start + 2 * NAME_LEN {
            return Err(PackError::Index(format!(
                "v2 index truncated: {} bytes for {count} objects",
                map.len()
            )));
        }

        Ok(Self {
            map,
            path,
            version: INDEX_VERSION,
            count,
            names_start,
            crcs_start,
            offsets_start,
            large_start,
        })
    }

    fn open_v1(map: Mmap, path: PathBuf) -> Result<Self, PackError> {
        if map.len() < FANOUT_BYTES + 2 * NAME_LEN {
            return Err(PackError::Index("v1 index too small".into()));
        }
        let count = be_u32(&map[255 * 4..]);
        let rows = FANOUT_BYTES;
        if map.len() < rows + count as usize * (4 + NAME_LEN) + 2 * NAME_LEN {
            return Err(PackError::Index("v1 index truncated".into()));
        }
        Ok(Self {
            map,
            path,
            version: 1,
            count,
            names_start: 0,
            crcs_start: 0,
            offsets_start: 0,
            large_start: 0,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of objects in the index (valid for both layouts).
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the pack offset of `name`.
    ///
    /// The fan-out table narrows the search to names sharing the first
    /// byte; a half-open binary search over the sorted name column does
    /// the rest. v1 indexes answer with an unsupported-version error.
    pub fn find(&self, name: &ObjectName) -> Result<Option<u64>, PackError> {
        if self.version != INDEX_VERSION {
            return Err(PackError::UnsupportedIndexVersion(self.version));
        }

        let (mut lo, mut hi) = self.bucket(name.first_byte());
        let target: &[u8] = name.as_bytes();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.name_bytes(mid).cmp(target) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Some(self.offset_at(mid as u32))),
            }
        }
        Ok(None)
    }

    /// The object name in sorted position `pos`.
    pub fn name_at(&self, pos: u32) -> ObjectName {
        let bytes = self.name_bytes(pos as usize);
        let mut arr = [0u8; NAME_LEN];
        arr.copy_from_slice(bytes);
        ObjectName::new(arr)
    }

    /// The pack offset in sorted position `pos`, following the 64-bit
    /// escape when bit 31 is set.
    pub fn offset_at(&self, pos: u32) -> u64 {
        let at = self.offsets_start + pos as usize * 4;
        let raw = be_u32(&self.map[at..]);
        if raw & 0x8000_0000 == 0 {
            u64::from(raw)
        } else {
            let slot = (raw & 0x7fff_ffff) as usize;
            let at = self.large_start + slot * 8;
            u64::from_be_bytes([
                self.map[at],
                self.map[at + 1],
                self.map[at + 2],
                self.map[at + 3],
                self.map[at + 4],
                self.map[at + 5],
                self.map[at + 6],
                self.map[at + 7],
            ])
        }
    }

    /// The CRC-32 of the raw entry bytes in sorted position `pos`.
    pub fn crc_at(&self, pos: u32) -> u32 {
        be_u32(&self.map[self.crcs_start + pos as usize * 4..])
    }

    /// The pack checksum recorded in the trailer.
    pub fn pack_trailer(&self) -> ObjectName {
        let at = self.map.len() - 2 * NAME_LEN;
        let mut arr = [0u8; NAME_LEN];
        arr.copy_from_slice(&self.map[at..at + NAME_LEN]);
        ObjectName::new(arr)
    }

    /// Iterate `(name, offset)` pairs in sorted name order. Empty for a
    /// v1 index, whose columns this reader does not interpret.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectName, u64)> + '_ {
        let count = if self.version == INDEX_VERSION {
            self.count
        } else {
            0
        };
        (0..count).map(|i| (self.name_at(i), self.offset_at(i)))
    }

    /// Fan-out bucket for a first byte, as a half-open position range.
    fn bucket(&self, first: u8) -> (usize, usize) {
        let hi = self.fanout_entry(first) as usize;
        let lo = match first {
            0 => 0,
            b => self.fanout_entry(b - 1) as usize,
        };
        (lo, hi)
    }

    fn fanout_entry(&self, slot: u8) -> u32 {
        let base = if self.version == INDEX_VERSION {
            V2_HEADER
        } else {
            0
        };
        be_u32(&self.map[base + slot as usize * 4..])
    }

    fn name_bytes(&self, pos: usize) -> &[u8] {
        let at = self.names_start + pos * NAME_LEN;
        &self.map[at..at + NAME_LEN]
    }
}

impl std::fmt::Debug for PackIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackIndex")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

/// Scan every `pack/*.idx` under `objects_dir` for `name`.
///
/// Returns the first `(idx_path, offset)` hit. Scan order is whatever the
/// directory yields; with duplicated objects any of the holding packs may
/// answer. Indexes that fail to open or cannot serve lookups are skipped.
pub fn search_packs(
    objects_dir: &Path,
    name: &ObjectName,
) -> Result<Option<(PathBuf, u64)>, PackError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(None);
    }

    for dirent in std::fs::read_dir(&pack_dir)? {
        let path = dirent?.path();
        if !path.extension().is_some_and(|ext| ext == "idx") {
            continue;
        }
        let Ok(index) = PackIndex::open(&path) else {
            continue;
        };
        match index.find(name) {
            Ok(Some(offset)) => return Ok(Some((path, offset))),
            Ok(None) => continue,
            // Legacy v1 indexes cannot answer lookups; keep scanning.
            Err(PackError::UnsupportedIndexVersion(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

fn be_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
