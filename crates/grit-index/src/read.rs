//! Index file parsing.

use bstr::{BString, ByteSlice};
use grit_hash::hasher::Hasher;
use grit_hash::{ObjectName, NAME_LEN};
use grit_object::EntryMode;

use crate::entry::{EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError, SIGNATURE};

/// Fixed bytes before the path: the stat block (40), the object name (20),
/// and the flag word (2).
const FIXED_PREFIX: usize = 62;

/// Parse a whole index file.
pub fn parse(data: &[u8]) -> Result<Index, IndexError> {
    if data.len() < 12 + NAME_LEN {
        return Err(IndexError::Header("file too short".into()));
    }

    // The trailer covers everything, so verify it before trusting any field.
    verify_checksum(data)?;

    if &data[..4] != SIGNATURE {
        return Err(IndexError::Header(format!(
            "bad signature {:?}",
            data[..4].as_bstr()
        )));
    }
    let version = be_u32(&data[4..]);
    if !(2..=3).contains(&version) {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let entry_count = be_u32(&data[8..]) as usize;

    let content_end = data.len() - NAME_LEN;
    let mut entries = Vec::with_capacity(entry_count.min(1 << 20));
    let mut cursor = 12;
    let mut prev_path: Option<BString> = None;

    for _ in 0..entry_count {
        let (entry, next) = parse_entry(data, cursor, version, content_end)?;

        if let Some(ref prev) = prev_path {
            if *prev >= entry.path {
                return Err(IndexError::Entry {
                    offset: cursor,
                    reason: format!(
                        "path {:?} not strictly after {:?}",
                        entry.path, prev
                    ),
                });
            }
        }
        prev_path = Some(entry.path.clone());
        entries.push(entry);
        cursor = next;
    }

    // Anything between the last entry and the trailer is extension data,
    // which this engine does not interpret.

    Ok(Index::from_parts(version, entries))
}

fn parse_entry(
    data: &[u8],
    start: usize,
    version: u32,
    content_end: usize,
) -> Result<(IndexEntry, usize), IndexError> {
    let fail = |reason: String| IndexError::Entry {
        offset: start,
        reason,
    };

    if start + FIXED_PREFIX > content_end {
        return Err(fail("record overruns the entry region".into()));
    }

    let stat = StatData {
        ctime_secs: be_u32(&data[start..]),
        ctime_nsecs: be_u32(&data[start + 4..]),
        mtime_secs: be_u32(&data[start + 8..]),
        mtime_nsecs: be_u32(&data[start + 12..]),
        dev: be_u32(&data[start + 16..]),
        ino: be_u32(&data[start + 20..]),
        uid: be_u32(&data[start + 28..]),
        gid: be_u32(&data[start + 32..]),
        size: be_u32(&data[start + 36..]),
    };
    if stat.ctime_nsecs >= 1_000_000_000 || stat.mtime_nsecs >= 1_000_000_000 {
        return Err(fail("nanosecond field out of range".into()));
    }

    let mode = EntryMode::from_raw(be_u32(&data[start + 24..]));

    let id = ObjectName::from_bytes(&data[start + 44..start + 44 + NAME_LEN])
        .map_err(|_| fail("bad object name".into()))?;

    let flag_word = u16::from_be_bytes([data[start + 60], data[start + 61]]);
    let assume_valid = flag_word & 0x8000 != 0;
    let extended = flag_word & 0x4000 != 0;
    let stage = ((flag_word >> 12) & 0x3) as u8;
    let name_length = (flag_word & 0x0fff) as usize;

    let mut cursor = start + FIXED_PREFIX;
    let mut intent_to_add = false;
    let mut skip_worktree = false;

    if extended {
        if version < 3 {
            return Err(fail("extended flag in a version 2 index".into()));
        }
        if cursor + 2 > content_end {
            return Err(fail("truncated extended flag word".into()));
        }
        let ext_word = u16::from_be_bytes([data[cursor], data[cursor + 1]]);
        if ext_word & !0x6000 != 0 {
            return Err(fail("unknown extended flag bits".into()));
        }
        intent_to_add = ext_word & 0x2000 != 0;
        skip_worktree = ext_word & 0x4000 != 0;
        cursor += 2;
    }

    let nul = data[cursor..content_end]
        .find_byte(0)
        .ok_or_else(|| fail("unterminated path".into()))?;
    let path = BString::from(&data[cursor..cursor + nul]);
    if path.is_empty() {
        return Err(fail("empty path".into()));
    }
    if name_length != path.len().min(crate::entry::NAME_LENGTH_CAP) {
        return Err(fail(format!(
            "name length field {name_length} does not match path of {} bytes",
            path.len()
        )));
    }
    cursor += nul;

    // The NUL terminator plus padding round the record up to a multiple of
    // eight; every filler byte must be zero.
    let consumed = cursor - start + 1;
    let padding = (8 - consumed % 8) % 8;
    let record_end = cursor + 1 + padding;
    if record_end > content_end {
        return Err(fail("padding overruns the entry region".into()));
    }
    if data[cursor..record_end].iter().any(|&b| b != 0) {
        return Err(fail("nonzero padding byte".into()));
    }

    let entry = IndexEntry {
        path,
        id,
        mode,
        stat,
        flags: EntryFlags {
            assume_valid,
            stage,
            intent_to_add,
            skip_worktree,
        },
    };
    Ok((entry, record_end))
}

fn verify_checksum(data: &[u8]) -> Result<(), IndexError> {
    let body = &data[..data.len() - NAME_LEN];
    let stored = &data[data.len() - NAME_LEN..];
    let computed = Hasher::digest(body).map_err(|_| IndexError::ChecksumMismatch)?;
    if computed.as_bytes() != stored {
        return Err(IndexError::ChecksumMismatch);
    }
    Ok(())
}

fn be_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
