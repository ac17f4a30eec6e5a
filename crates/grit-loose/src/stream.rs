use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectName;
use grit_object::{header, ObjectKind};

use crate::read::sniff_header;
use crate::{LooseError, LooseStore};

/// Streaming reader over a loose object's payload.
///
/// The frame header is parsed up front; reads yield payload bytes only,
/// clamped to the declared size. Header sniffing inflates slightly past the
/// NUL, so those payload bytes sit in a pending buffer and are served
/// before the inflater is asked for more.
pub struct LooseStream {
    kind: ObjectKind,
    size: usize,
    pending: Vec<u8>,
    pending_pos: usize,
    decoder: ZlibDecoder<fs::File>,
    delivered: usize,
}

impl LooseStream {
    /// The object's kind.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The declared payload size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Payload bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.size.saturating_sub(self.delivered)
    }
}

impl Read for LooseStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = remaining.min(buf.len());

        // Serve over-read header bytes first.
        if self.pending_pos < self.pending.len() {
            let available = &self.pending[self.pending_pos..];
            let n = want.min(available.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.pending_pos += n;
            self.delivered += n;
            return Ok(n);
        }

        let n = self.decoder.read(&mut buf[..want])?;
        self.delivered += n;
        Ok(n)
    }
}

impl LooseStore {
    /// Open a payload stream for a loose object.
    ///
    /// A missing object is `Ok(None)`.
    pub fn stream(&self, name: &ObjectName) -> Result<Option<LooseStream>, LooseError> {
        let file = match fs::File::open(self.object_path(name)) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let mut decoder = ZlibDecoder::new(file);
        let sniffed = sniff_header(&mut decoder, name)?;
        let (kind, size, header_len) = header::parse(&sniffed)?;

        Ok(Some(LooseStream {
            kind,
            size,
            pending: sniffed,
            pending_pos: header_len,
            decoder,
            delivered: 0,
        }))
    }
}
