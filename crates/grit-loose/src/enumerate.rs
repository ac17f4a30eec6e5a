use std::fs;
use std::path::PathBuf;

use grit_hash::ObjectName;

use crate::{LooseError, LooseStore};

/// Iterator over every object name in the loose tier.
///
/// Walks the 256 fan-out directories in hex order and reassembles each
/// name from the two-level file layout. Files that do not look like
/// object names (wrong length, non-hex) are skipped; packs keep their
/// own inventory.
pub struct LooseIter {
    objects_dir: PathBuf,
    /// Next fan-out directory to open, 0..=256.
    bucket: usize,
    /// Names drained from the current bucket, reversed for pop().
    pending: Vec<ObjectName>,
}

impl LooseIter {
    fn fill_from_next_bucket(&mut self) -> Result<(), LooseError> {
        while self.pending.is_empty() && self.bucket < 256 {
            let dir_name = format!("{:02x}", self.bucket);
            self.bucket += 1;

            let dir = self.objects_dir.join(&dir_name);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LooseError::Io(e)),
            };

            let mut names = Vec::new();
            for dirent in entries {
                let dirent = dirent?;
                let Some(rest) = dirent.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                if rest.len() != 38 {
                    continue;
                }
                if let Ok(name) = ObjectName::from_hex(&format!("{dir_name}{rest}")) {
                    names.push(name);
                }
            }
            names.sort();
            names.reverse();
            self.pending = names;
        }
        Ok(())
    }
}

impl Iterator for LooseIter {
    type Item = Result<ObjectName, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() {
            if let Err(e) = self.fill_from_next_bucket() {
                return Some(Err(e));
            }
        }
        self.pending.pop().map(Ok)
    }
}

impl LooseStore {
    /// Iterate every loose object name, sorted.
    pub fn iter(&self) -> LooseIter {
        LooseIter {
            objects_dir: self.objects_dir().to_path_buf(),
            bucket: 0,
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_object::ObjectKind;

    #[test]
    fn empty_store_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn yields_every_written_object_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());

        let mut written: Vec<ObjectName> = (0u8..20)
            .map(|i| store.write(ObjectKind::Blob, &[i]).unwrap())
            .collect();
        written.sort();

        let seen: Vec<ObjectName> = store.iter().map(|r| r.unwrap()).collect();
        assert_eq!(seen, written);
    }

    #[test]
    fn foreign_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let name = store.write(ObjectKind::Blob, b"real").unwrap();

        // Neither of these is a loose object.
        fs::create_dir_all(dir.path().join("ab")).unwrap();
        fs::write(dir.path().join("ab/short"), b"x").unwrap();
        fs::write(dir.path().join("pack-marker"), b"y").unwrap();

        let seen: Vec<ObjectName> = store.iter().map(|r| r.unwrap()).collect();
        assert_eq!(seen, [name]);
    }
}
