use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use grit_hash::hasher::Hasher;
use grit_hash::ObjectName;
use grit_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Store a payload of the given kind, returning its name.
    ///
    /// The name is computed before anything touches disk. When the object
    /// already exists the write is skipped: content addressing plus a fixed
    /// compression level means the bytes on disk are already what a rewrite
    /// would produce.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectName, LooseError> {
        let frame = header::write(kind, payload.len());

        let name = {
            let mut hasher = Hasher::new();
            hasher.update(&frame);
            hasher.update(payload);
            hasher.finalize()?
        };

        if self.contains(&name) {
            return Ok(name);
        }

        let final_path = self.object_path(&name);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = deflate_to_temp(&self.objects_dir, &frame, payload, self.level)?;
        place_object(&tmp_path, &final_path)?;

        Ok(name)
    }

    /// Store a parsed object.
    pub fn write_object(&self, obj: &Object) -> Result<ObjectName, LooseError> {
        self.write(obj.kind(), &obj.payload())
    }
}

/// Compress the framed object into a temp file inside `objects_dir`, so the
/// final rename stays on one filesystem.
fn deflate_to_temp(
    objects_dir: &Path,
    frame: &[u8],
    payload: &[u8],
    level: flate2::Compression,
) -> Result<PathBuf, LooseError> {
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let tmp_path = objects_dir.join(format!("incoming_{}_{nonce}", std::process::id()));

    let file = fs::File::create(&tmp_path)?;
    let mut encoder = ZlibEncoder::new(file, level);
    encoder.write_all(frame)?;
    encoder.write_all(payload)?;
    encoder.finish()?;

    // Loose objects are immutable; 0444 matches what C git leaves behind.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o444))?;
    }

    Ok(tmp_path)
}

/// Move the temp file into place. Losing a rename race to another writer is
/// fine: the other writer stored identical bytes.
fn place_object(tmp: &Path, final_path: &Path) -> Result<(), LooseError> {
    match fs::rename(tmp, final_path) {
        Ok(()) => Ok(()),
        Err(_) if final_path.exists() => {
            let _ = fs::remove_file(tmp);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(tmp);
            Err(LooseError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_known_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());

        let name = store.write(ObjectKind::Blob, b"hello\n").unwrap();
        assert_eq!(name.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(store.contains(&name));
        assert!(store.object_path(&name).is_file());
    }

    #[test]
    fn rewrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());

        let first = store.write(ObjectKind::Blob, b"same bytes").unwrap();
        let on_disk = fs::read(store.object_path(&first)).unwrap();

        let second = store.write(ObjectKind::Blob, b"same bytes").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(store.object_path(&second)).unwrap(), on_disk);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        store.write(ObjectKind::Blob, b"tidy").unwrap();

        let stray: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .collect();
        assert!(stray.is_empty(), "found stray files: {stray:?}");
    }
}
