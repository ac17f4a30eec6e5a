use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectName;

use crate::{ObjectError, Signature};

/// A commit object.
///
/// Exactly one tree, author, and committer; any number of parents; an
/// optional detached PGP signature carried in the `gpgsig` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectName,
    pub parents: Vec<ObjectName>,
    pub author: Signature,
    pub committer: Signature,
    pub gpgsig: Option<BString>,
    /// Everything after the blank header separator.
    pub message: BString,
}

/// Cursor-based header block scanner shared by commit and tag parsing.
///
/// Yields `(key, value)` pairs where the value of a multi-line header has
/// its continuation lines (leading space stripped) joined with `\n`.
/// Stops after the blank separator line; `rest()` is then the message.
pub(crate) struct HeaderBlock<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> HeaderBlock<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn next_header(&mut self) -> Option<(&'a [u8], BString)> {
        loop {
            if self.pos >= self.data.len() {
                return None;
            }
            if self.data[self.pos] == b'\n' {
                self.pos += 1;
                return None;
            }

            let line_end = self.data[self.pos..]
                .find_byte(b'\n')
                .map(|p| p + self.pos)
                .unwrap_or(self.data.len());
            let line = &self.data[self.pos..line_end];
            self.pos = (line_end + 1).min(self.data.len());

            let Some(space) = line.find_byte(b' ') else {
                // Not a key-value line; skip it.
                continue;
            };
            let key = &line[..space];
            let mut value = BString::from(&line[space + 1..]);

            // Fold continuation lines (leading space) into the value.
            while self.pos < self.data.len() && self.data[self.pos] == b' ' {
                let cont_end = self.data[self.pos..]
                    .find_byte(b'\n')
                    .map(|p| p + self.pos)
                    .unwrap_or(self.data.len());
                value.push(b'\n');
                value.extend_from_slice(&self.data[self.pos + 1..cont_end]);
                self.pos = (cont_end + 1).min(self.data.len());
            }

            return Some((key, value));
        }
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    object: &'static str,
    field: &'static str,
) -> Result<(), ObjectError> {
    if slot.is_some() {
        return Err(ObjectError::DuplicateField { object, field });
    }
    *slot = Some(value);
    Ok(())
}

fn parse_name(value: &BStr, what: &'static str) -> Result<ObjectName, ObjectError> {
    let hex = value
        .to_str()
        .map_err(|_| ObjectError::Header(format!("non-ASCII {what} value")))?;
    Ok(ObjectName::from_hex(hex)?)
}

impl Commit {
    /// Parse commit payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectName> = None;
        let mut parents = Vec::new();
        let mut author: Option<Signature> = None;
        let mut committer: Option<Signature> = None;
        let mut gpgsig: Option<BString> = None;

        let mut headers = HeaderBlock::new(payload);
        while let Some((key, value)) = headers.next_header() {
            match key {
                b"tree" => {
                    let id = parse_name(value.as_bstr(), "tree")?;
                    set_once(&mut tree, id, "commit", "tree")?;
                }
                b"parent" => parents.push(parse_name(value.as_bstr(), "parent")?),
                b"author" => {
                    let sig = Signature::parse(&value)?;
                    set_once(&mut author, sig, "commit", "author")?;
                }
                b"committer" => {
                    let sig = Signature::parse(&value)?;
                    set_once(&mut committer, sig, "commit", "committer")?;
                }
                b"gpgsig" => set_once(&mut gpgsig, value, "commit", "gpgsig")?,
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or(ObjectError::MissingField {
                object: "commit",
                field: "tree",
            })?,
            parents,
            author: author.ok_or(ObjectError::MissingField {
                object: "commit",
                field: "author",
            })?,
            committer: committer.ok_or(ObjectError::MissingField {
                object: "commit",
                field: "committer",
            })?,
            gpgsig,
            message: BString::from(headers.rest()),
        })
    }

    /// Serialize commit payload bytes in canonical header order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');

        for parent in &self.parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }

        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author.to_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"committer ");
        out.extend_from_slice(&self.committer.to_bytes());
        out.push(b'\n');

        if let Some(ref sig) = self.gpgsig {
            out.extend_from_slice(b"gpgsig ");
            for (i, line) in sig.split(|&b| b == b'\n').enumerate() {
                if i > 0 {
                    out.extend_from_slice(b"\n ");
                }
                out.extend_from_slice(line);
            }
            out.push(b'\n');
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// The first parent, if any.
    pub fn first_parent(&self) -> Option<&ObjectName> {
        self.parents.first()
    }

    /// True for a parentless commit.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// The first line of the message.
    pub fn summary(&self) -> &BStr {
        match self.message.find_byte(b'\n') {
            Some(pos) => self.message[..pos].as_bstr(),
            None => self.message.as_bstr(),
        }
    }
}
