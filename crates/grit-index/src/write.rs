//! Index file serialization.

use std::io::Write;
use std::path::Path;

use grit_hash::hasher::Hasher;
use grit_utils::LockFile;

use crate::entry::{IndexEntry, NAME_LENGTH_CAP};
use crate::{Index, IndexError, SIGNATURE};

/// Atomically rewrite the index file through a lock file.
pub fn write_file(index: &Index, path: &Path) -> Result<(), IndexError> {
    let data = serialize(index)?;
    let mut lock = LockFile::acquire(path)?;
    lock.write_all(&data)?;
    lock.commit()?;
    Ok(())
}

/// Serialize the index, trailer included.
pub fn serialize(index: &Index) -> Result<Vec<u8>, IndexError> {
    // Version 3 only when some entry actually needs the extended word.
    let version: u32 = if index.entries().iter().any(|e| e.flags.has_extended()) {
        3
    } else {
        2
    };

    let mut entries: Vec<&IndexEntry> = index.entries().iter().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        write_entry(&mut out, entry, version);
    }

    let trailer = Hasher::digest(&out)?;
    out.extend_from_slice(trailer.as_bytes());
    Ok(out)
}

fn write_entry(out: &mut Vec<u8>, entry: &IndexEntry, version: u32) {
    let record_start = out.len();

    out.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
    out.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
    out.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
    out.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
    out.extend_from_slice(&entry.stat.dev.to_be_bytes());
    out.extend_from_slice(&entry.stat.ino.to_be_bytes());
    out.extend_from_slice(&entry.mode.raw().to_be_bytes());
    out.extend_from_slice(&entry.stat.uid.to_be_bytes());
    out.extend_from_slice(&entry.stat.gid.to_be_bytes());
    out.extend_from_slice(&entry.stat.size.to_be_bytes());
    out.extend_from_slice(entry.id.as_bytes());

    let extended = version >= 3 && entry.flags.has_extended();
    let mut flag_word = entry.path.len().min(NAME_LENGTH_CAP) as u16;
    flag_word |= u16::from(entry.flags.stage & 0x3) << 12;
    if extended {
        flag_word |= 0x4000;
    }
    if entry.flags.assume_valid {
        flag_word |= 0x8000;
    }
    out.extend_from_slice(&flag_word.to_be_bytes());

    if extended {
        let mut ext_word = 0u16;
        if entry.flags.intent_to_add {
            ext_word |= 0x2000;
        }
        if entry.flags.skip_worktree {
            ext_word |= 0x4000;
        }
        out.extend_from_slice(&ext_word.to_be_bytes());
    }

    out.extend_from_slice(&entry.path);

    // NUL terminator, then zero padding to the next 8-byte boundary.
    let consumed = out.len() - record_start + 1;
    let padding = (8 - consumed % 8) % 8;
    out.resize(out.len() + 1 + padding, 0);
}
