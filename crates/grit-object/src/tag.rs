use bstr::{BString, ByteSlice};
use grit_hash::ObjectName;

use crate::commit::HeaderBlock;
use crate::{ObjectError, ObjectKind, Signature};

/// An annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// The tagged object.
    pub target: ObjectName,
    /// Kind of the tagged object.
    pub target_kind: ObjectKind,
    /// The tag's own name.
    pub tag_name: BString,
    /// Absent only in tags from the era before taggers were recorded.
    pub tagger: Option<Signature>,
    pub message: BString,
    /// Trailing signature block, split out of the message when present.
    pub gpgsig: Option<BString>,
}

impl Tag {
    /// Parse tag payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut target: Option<ObjectName> = None;
        let mut target_kind: Option<ObjectKind> = None;
        let mut tag_name: Option<BString> = None;
        let mut tagger: Option<Signature> = None;

        let mut headers = HeaderBlock::new(payload);
        while let Some((key, value)) = headers.next_header() {
            let dup = |field| ObjectError::DuplicateField {
                object: "tag",
                field,
            };
            match key {
                b"object" => {
                    if target.is_some() {
                        return Err(dup("object"));
                    }
                    let hex = value
                        .to_str()
                        .map_err(|_| ObjectError::Header("non-ASCII object value".into()))?;
                    target = Some(ObjectName::from_hex(hex)?);
                }
                b"type" => {
                    if target_kind.is_some() {
                        return Err(dup("type"));
                    }
                    target_kind = Some(ObjectKind::from_bytes(&value)?);
                }
                b"tag" => {
                    if tag_name.is_some() {
                        return Err(dup("tag"));
                    }
                    tag_name = Some(value);
                }
                b"tagger" => {
                    if tagger.is_some() {
                        return Err(dup("tagger"));
                    }
                    tagger = Some(Signature::parse(&value)?);
                }
                _ => {}
            }
        }

        let missing = |field| ObjectError::MissingField {
            object: "tag",
            field,
        };

        // A signature block trails the message when the tag is signed.
        let body = headers.rest();
        let (message, gpgsig) = match body.find(b"-----BEGIN PGP SIGNATURE-----") {
            Some(at) => (
                BString::from(&body[..at]),
                Some(BString::from(&body[at..])),
            ),
            None => (BString::from(body), None),
        };

        Ok(Self {
            target: target.ok_or_else(|| missing("object"))?,
            target_kind: target_kind.ok_or_else(|| missing("type"))?,
            tag_name: tag_name.ok_or_else(|| missing("tag"))?,
            tagger,
            message,
            gpgsig,
        })
    }

    /// Serialize tag payload bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"object ");
        out.extend_from_slice(self.target.to_hex().as_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"type ");
        out.extend_from_slice(self.target_kind.as_str().as_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"tag ");
        out.extend_from_slice(&self.tag_name);
        out.push(b'\n');

        if let Some(ref tagger) = self.tagger {
            out.extend_from_slice(b"tagger ");
            out.extend_from_slice(&tagger.to_bytes());
            out.push(b'\n');
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        if let Some(ref sig) = self.gpgsig {
            out.extend_from_slice(sig);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"object ce013625030ba8dba906f756967f9e9ca394464a\n");
        out.extend_from_slice(b"type commit\n");
        out.extend_from_slice(b"tag v1.2.0\n");
        out.extend_from_slice(b"tagger T Agger <tagger@example.com> 1700000000 +0000\n");
        out.extend_from_slice(b"\n");
        out.extend_from_slice(b"release notes\n");
        out
    }

    #[test]
    fn parse_sample() {
        let tag = Tag::parse(&sample()).unwrap();
        assert_eq!(
            tag.target.to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
        assert_eq!(tag.target_kind, ObjectKind::Commit);
        assert_eq!(tag.tag_name, "v1.2.0");
        assert_eq!(tag.tagger.as_ref().unwrap().name, "T Agger");
        assert_eq!(tag.message, "release notes\n");
        assert!(tag.gpgsig.is_none());
    }

    #[test]
    fn roundtrip_bytes() {
        let original = sample();
        let tag = Tag::parse(&original).unwrap();
        assert_eq!(tag.serialize(), original);
    }

    #[test]
    fn taggerless_tag_parses() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"object ce013625030ba8dba906f756967f9e9ca394464a\n");
        payload.extend_from_slice(b"type blob\n");
        payload.extend_from_slice(b"tag ancient\n");
        payload.extend_from_slice(b"\nold\n");

        let tag = Tag::parse(&payload).unwrap();
        assert!(tag.tagger.is_none());
        assert_eq!(tag.serialize(), payload);
    }

    #[test]
    fn signed_tag_splits_signature() {
        let mut payload = sample();
        payload.extend_from_slice(
            b"-----BEGIN PGP SIGNATURE-----\nxyz\n-----END PGP SIGNATURE-----\n",
        );

        let tag = Tag::parse(&payload).unwrap();
        assert_eq!(tag.message, "release notes\n");
        assert!(tag
            .gpgsig
            .as_ref()
            .unwrap()
            .starts_with(b"-----BEGIN PGP SIGNATURE-----"));
        assert_eq!(tag.serialize(), payload);
    }

    #[test]
    fn missing_headers_are_rejected() {
        assert!(Tag::parse(b"type commit\ntag v1\n\nmsg\n").is_err());
        assert!(Tag::parse(
            b"object ce013625030ba8dba906f756967f9e9ca394464a\ntag v1\n\nmsg\n"
        )
        .is_err());
    }

    #[test]
    fn duplicate_object_is_rejected() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"object ce013625030ba8dba906f756967f9e9ca394464a\n");
        payload.extend_from_slice(b"object ce013625030ba8dba906f756967f9e9ca394464a\n");
        payload.extend_from_slice(b"type commit\n");
        payload.extend_from_slice(b"tag dup\n");
        payload.extend_from_slice(b"\nmsg\n");

        assert!(matches!(
            Tag::parse(&payload).unwrap_err(),
            ObjectError::DuplicateField {
                object: "tag",
                field: "object"
            }
        ));
    }
}
