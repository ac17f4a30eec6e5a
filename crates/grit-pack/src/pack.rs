//! Memory-mapped pack file reading.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use grit_hash::hasher::Hasher;
use grit_hash::{ObjectName, NAME_LEN};
use memmap2::Mmap;

use crate::entry::{parse_header, EntryInfo};
use crate::{PackError, RawKind, PACK_HEADER_LEN, PACK_MAGIC, PACK_VERSION};

/// A read-only, memory-mapped pack file.
///
/// The mapping owns the file handle; dropping the `PackFile` releases both.
/// Nothing here touches the `.idx` sidecar: a pack is parseable on its own,
/// and offset lookup is the index's business.
pub struct PackFile {
    map: Mmap,
    path: PathBuf,
    object_count: u32,
}

impl PackFile {
    /// Open and validate a `.pack` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        let map = unsafe { Mmap::map(&file)? };

        if map.len() < PACK_HEADER_LEN + NAME_LEN {
            return Err(PackError::Header("file too small".into()));
        }
        if &map[..4] != PACK_MAGIC {
            return Err(PackError::Header("bad PACK magic".into()));
        }
        let version = be_u32(&map[4..8]);
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let object_count = be_u32(&map[8..12]);

        Ok(Self {
            map,
            path,
            object_count,
        })
    }

    /// Number of entries the header declares.
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Path of the underlying `.pack` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw mapped bytes.
    pub fn data(&self) -> &[u8] {
        &self.map
    }

    /// End of the entry region: everything after it is the trailer.
    fn entries_end(&self) -> usize {
        self.map.len() - NAME_LEN
    }

    /// Parse the entry header at an absolute offset.
    pub fn header_at(&self, offset: u64) -> Result<EntryInfo, PackError> {
        let end = self.entries_end();
        if offset < PACK_HEADER_LEN as u64 || offset >= end as u64 {
            return Err(PackError::CorruptEntry {
                offset,
                reason: "offset outside the entry region".into(),
            });
        }
        parse_header(&self.map[offset as usize..end], offset)
    }

    /// Open a streaming reader over the entry at `offset`.
    pub fn stream_at(&self, offset: u64) -> Result<EntryStream<'_>, PackError> {
        let info = self.header_at(offset)?;
        Ok(self.stream_for(info))
    }

    fn stream_for(&self, info: EntryInfo) -> EntryStream<'_> {
        let compressed = &self.map[info.data_offset as usize..self.entries_end()];
        EntryStream {
            info,
            decoder: ZlibDecoder::new(compressed),
            delivered: 0,
        }
    }

    /// Inflate an entry's whole payload, verifying the declared size.
    pub fn inflate(&self, info: &EntryInfo) -> Result<Vec<u8>, PackError> {
        Ok(self.inflate_counting(info)?.0)
    }

    /// Inflate a payload and also report how many compressed bytes the zlib
    /// stream occupied, which is where the next entry begins.
    fn inflate_counting(&self, info: &EntryInfo) -> Result<(Vec<u8>, u64), PackError> {
        let compressed = &self.map[info.data_offset as usize..self.entries_end()];
        let mut decoder = ZlibDecoder::new(compressed);
        let mut out = Vec::with_capacity(info.size.min(1 << 24) as usize);
        decoder
            .read_to_end(&mut out)
            .map_err(|_| PackError::CorruptEntry {
                offset: info.offset,
                reason: "zlib stream failed to inflate".into(),
            })?;
        if out.len() as u64 != info.size {
            return Err(PackError::SizeMismatch {
                offset: info.offset,
                declared: info.size,
                actual: out.len() as u64,
            });
        }
        Ok((out, decoder.total_in()))
    }

    /// Walk every entry from byte 12 to the trailer in pack order.
    ///
    /// Non-delta entries come back named (the framed payload is hashed as a
    /// side effect of draining the stream). Delta entries keep their raw
    /// kind and no name, since naming them means resolving the chain.
    pub fn iterate(&self) -> PackIter<'_> {
        PackIter {
            pack: self,
            next_offset: PACK_HEADER_LEN as u64,
            remaining: self.object_count,
            poisoned: false,
        }
    }

    /// The stored trailer hash.
    pub fn trailer(&self) -> ObjectName {
        let start = self.entries_end();
        let mut bytes = [0u8; NAME_LEN];
        bytes.copy_from_slice(&self.map[start..]);
        ObjectName::new(bytes)
    }

    /// Recompute the trailer hash over everything before it and compare.
    pub fn validate(&self) -> Result<(), PackError> {
        let mut hasher = Hasher::new();
        hasher.update(&self.map[..self.entries_end()]);
        let computed = hasher.finalize()?;
        let stored = self.trailer();
        if computed != stored {
            return Err(PackError::TrailerMismatch { stored, computed });
        }
        Ok(())
    }
}

impl std::fmt::Debug for PackFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackFile")
            .field("path", &self.path)
            .field("object_count", &self.object_count)
            .finish_non_exhaustive()
    }
}

fn be_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

/// Streaming reader over one entry's inflated payload.
///
/// Yields exactly the declared size on a well-formed entry; metadata from
/// the entry header rides along.
pub struct EntryStream<'a> {
    info: EntryInfo,
    decoder: ZlibDecoder<&'a [u8]>,
    delivered: u64,
}

impl EntryStream<'_> {
    /// The entry's header, including kind and declared size.
    pub fn info(&self) -> &EntryInfo {
        &self.info
    }

    pub fn kind(&self) -> RawKind {
        self.info.kind
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Offset of the entry's first header byte.
    pub fn offset(&self) -> u64 {
        self.info.offset
    }
}

impl Read for EntryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.info.size.saturating_sub(self.delivered);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = self.decoder.read(&mut buf[..want])?;
        self.delivered += n as u64;
        Ok(n)
    }
}

/// One record from [`PackFile::iterate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflatedEntry {
    pub offset: u64,
    pub kind: RawKind,
    /// Present for non-delta entries only.
    pub name: Option<ObjectName>,
    pub payload: Vec<u8>,
}

/// Sequential entry iterator. Each step fully drains the current zlib
/// stream; its compressed length locates the next header.
pub struct PackIter<'a> {
    pack: &'a PackFile,
    next_offset: u64,
    remaining: u32,
    poisoned: bool,
}

impl PackIter<'_> {
    fn step(&mut self) -> Result<InflatedEntry, PackError> {
        let info = self.pack.header_at(self.next_offset)?;
        let (payload, compressed_len) = self.pack.inflate_counting(&info)?;

        let name = match info.kind.as_object_kind() {
            Some(kind) => Some(grit_hash::hasher::hash_object(kind.as_str(), &payload)?),
            None => None,
        };

        self.next_offset = info.data_offset + compressed_len;
        self.remaining -= 1;

        Ok(InflatedEntry {
            offset: info.offset,
            kind: info.kind,
            name,
            payload,
        })
    }
}

impl Iterator for PackIter<'_> {
    type Item = Result<InflatedEntry, PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.remaining == 0 {
            return None;
        }
        let result = self.step();
        if result.is_err() {
            self.poisoned = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.poisoned {
            (0, Some(0))
        } else {
            (self.remaining as usize, Some(self.remaining as usize))
        }
    }
}
