use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectName;
use grit_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseStore, STAGE_BUF};

impl LooseStore {
    /// Read and parse a loose object.
    ///
    /// A missing file is `Ok(None)`; an unreadable or malformed one is an
    /// error.
    pub fn read(&self, name: &ObjectName) -> Result<Option<Object>, LooseError> {
        let compressed = match fs::read(self.object_path(name)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let inflated = inflate_all(&compressed, name)?;

        let (_, declared, header_len) = header::parse(&inflated)?;
        let actual = inflated.len() - header_len;
        if declared != actual {
            return Err(LooseError::Corrupt {
                name: name.to_hex(),
                reason: format!("header declares {declared} bytes, file holds {actual}"),
            });
        }

        Ok(Some(Object::parse_framed(&inflated)?))
    }

    /// Read a loose object and verify that its content actually hashes to
    /// the name it is filed under.
    ///
    /// Catches on-disk corruption the zlib layer cannot see. Missing is
    /// `Ok(None)`.
    pub fn read_verified(&self, name: &ObjectName) -> Result<Option<Object>, LooseError> {
        let path = self.object_path(name);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let inflated = inflate_all(&compressed, name)?;
        let actual = grit_hash::hasher::Hasher::digest(&inflated)?;
        if actual != *name {
            return Err(LooseError::Corrupt {
                name: name.to_hex(),
                reason: format!("content hashes to {actual}"),
            });
        }

        Ok(Some(Object::parse_framed(&inflated)?))
    }

    /// Read only the kind and declared size, inflating just enough bytes to
    /// cover the frame header.
    pub fn read_header(
        &self,
        name: &ObjectName,
    ) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        let file = match fs::File::open(self.object_path(name)) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let mut decoder = ZlibDecoder::new(file);
        let sniffed = sniff_header(&mut decoder, name)?;
        let (kind, size, _) = header::parse(&sniffed)?;
        Ok(Some((kind, size)))
    }
}

/// Inflate a whole loose object file.
pub(crate) fn inflate_all(compressed: &[u8], name: &ObjectName) -> Result<Vec<u8>, LooseError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| LooseError::Inflate {
            name: name.to_hex(),
            source: e,
        })?;
    Ok(out)
}

/// Inflate until the frame header's NUL shows up, within the staging buffer.
///
/// Returns every inflated byte so far, which may extend past the header.
pub(crate) fn sniff_header(
    decoder: &mut impl Read,
    name: &ObjectName,
) -> Result<Vec<u8>, LooseError> {
    let mut sniffed = Vec::with_capacity(64);
    let mut chunk = [0u8; 64];

    loop {
        if sniffed.len() >= STAGE_BUF {
            return Err(LooseError::Corrupt {
                name: name.to_hex(),
                reason: format!("no header terminator in the first {STAGE_BUF} bytes"),
            });
        }
        let n = decoder.read(&mut chunk).map_err(|e| LooseError::Inflate {
            name: name.to_hex(),
            source: e,
        })?;
        if n == 0 {
            return Err(LooseError::Corrupt {
                name: name.to_hex(),
                reason: "stream ended before the header terminator".into(),
            });
        }
        sniffed.extend_from_slice(&chunk[..n]);
        if sniffed.contains(&0) {
            return Ok(sniffed);
        }
    }
}
