//! Object model for the grit storage engine.
//!
//! The four object kinds (blob, tree, commit, tag), the framed header
//! codec, identity signatures, and an LRU cache for parsed objects.
//! Parsing is byte oriented: names, paths, and messages are [`bstr`]
//! byte strings, never assumed to be UTF-8.

pub mod cache;
mod commit;
pub mod header;
mod signature;
mod tag;
mod tree;

pub use commit::Commit;
pub use signature::Signature;
pub use tag::Tag;
pub use tree::{EntryMode, Tree, TreeEntry};

use bstr::BString;
use grit_hash::{HashError, ObjectName};

/// Errors produced by object parsing and serialization.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("unknown object kind: {0}")]
    UnknownKind(BString),

    #[error("malformed object header: {0}")]
    Header(String),

    #[error("truncated object: header declares {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed tree row at offset {offset}: {reason}")]
    TreeRow { offset: usize, reason: String },

    #[error("invalid entry mode: {0}")]
    Mode(String),

    #[error("{object} is missing its '{field}' header")]
    MissingField {
        object: &'static str,
        field: &'static str,
    },

    #[error("{object} repeats its '{field}' header")]
    DuplicateField {
        object: &'static str,
        field: &'static str,
    },

    #[error("malformed signature: {0}")]
    Signature(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The four kinds of stored objects.
///
/// Pack files additionally encode two delta kinds, but those are a storage
/// detail; after resolution every object is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    /// Parse the ASCII tag used in object headers.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::UnknownKind(BString::from(s))),
        }
    }

    /// The canonical ASCII tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A parsed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(BString),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Parse a framed object: `"<kind> <size>\0"` followed by the payload.
    pub fn parse_framed(data: &[u8]) -> Result<Self, ObjectError> {
        let (kind, size, header_len) = header::parse(data)?;
        let payload = &data[header_len..];
        if payload.len() < size {
            return Err(ObjectError::Truncated {
                expected: size,
                actual: payload.len(),
            });
        }
        Self::parse_payload(kind, &payload[..size])
    }

    /// Parse a bare payload of known kind.
    pub fn parse_payload(kind: ObjectKind, payload: &[u8]) -> Result<Self, ObjectError> {
        match kind {
            ObjectKind::Blob => Ok(Self::Blob(BString::from(payload))),
            ObjectKind::Tree => Ok(Self::Tree(Tree::parse(payload)?)),
            ObjectKind::Commit => Ok(Self::Commit(Commit::parse(payload)?)),
            ObjectKind::Tag => Ok(Self::Tag(Tag::parse(payload)?)),
        }
    }

    /// Serialize just the payload bytes.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Blob(data) => data.to_vec(),
            Self::Tree(t) => t.serialize(),
            Self::Commit(c) => c.serialize(),
            Self::Tag(t) => t.serialize(),
        }
    }

    /// Serialize the framed form (header then payload).
    pub fn serialize(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut out = header::write(self.kind(), payload.len());
        out.extend_from_slice(&payload);
        out
    }

    /// The object's kind.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    /// Hash the framed form to produce the object's name.
    pub fn name(&self) -> Result<ObjectName, ObjectError> {
        let payload = self.payload();
        Ok(grit_hash::hasher::hash_object(
            self.kind().as_str(),
            &payload,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        assert_eq!(ObjectKind::from_bytes(b"blob").unwrap(), ObjectKind::Blob);
        assert_eq!(ObjectKind::from_bytes(b"tree").unwrap(), ObjectKind::Tree);
        assert_eq!(
            ObjectKind::from_bytes(b"commit").unwrap(),
            ObjectKind::Commit
        );
        assert_eq!(ObjectKind::from_bytes(b"tag").unwrap(), ObjectKind::Tag);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = ObjectKind::from_bytes(b"blobby").unwrap_err();
        assert!(matches!(err, ObjectError::UnknownKind(_)));
    }

    #[test]
    fn blob_framed_roundtrip() {
        let obj = Object::parse_framed(b"blob 6\0hello\n").unwrap();
        assert_eq!(obj.kind(), ObjectKind::Blob);
        assert_eq!(obj.serialize(), b"blob 6\0hello\n");
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let err = Object::parse_framed(b"blob 10\0short").unwrap_err();
        assert!(matches!(
            err,
            ObjectError::Truncated {
                expected: 10,
                actual: 5
            }
        ));
    }

    #[test]
    fn name_matches_reference_digest() {
        let obj = Object::Blob(BString::from("hello\n"));
        assert_eq!(
            obj.name().unwrap().to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }
}
