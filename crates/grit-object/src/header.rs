//! The framed object header: `"<kind> <size>\0"`.

use bstr::ByteSlice;

use crate::{ObjectError, ObjectKind};

/// Parse a framed header.
///
/// Returns `(kind, payload_size, header_len)` where `header_len` includes
/// the terminating NUL.
pub fn parse(data: &[u8]) -> Result<(ObjectKind, usize, usize), ObjectError> {
    let nul = data
        .find_byte(0)
        .ok_or_else(|| ObjectError::Header("missing NUL terminator".into()))?;
    let header = &data[..nul];

    let space = header
        .find_byte(b' ')
        .ok_or_else(|| ObjectError::Header("missing space between kind and size".into()))?;

    let kind = ObjectKind::from_bytes(&header[..space])?;

    let size_str = std::str::from_utf8(&header[space + 1..])
        .map_err(|_| ObjectError::Header("size is not ASCII".into()))?;
    let size: usize = size_str
        .parse()
        .map_err(|_| ObjectError::Header(format!("invalid size: {size_str:?}")))?;

    Ok((kind, size, nul + 1))
}

/// Emit a framed header.
pub fn write(kind: ObjectKind, size: usize) -> Vec<u8> {
    format!("{kind} {size}\0").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_blob() {
        let (kind, size, len) = parse(b"blob 12\0hello world!").unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(size, 12);
        assert_eq!(len, 8);
    }

    #[test]
    fn roundtrip() {
        let hdr = write(ObjectKind::Tree, 42);
        let (kind, size, len) = parse(&hdr).unwrap();
        assert_eq!(kind, ObjectKind::Tree);
        assert_eq!(size, 42);
        assert_eq!(len, hdr.len());
    }

    #[test]
    fn missing_nul() {
        assert!(parse(b"blob 12").is_err());
    }

    #[test]
    fn missing_space() {
        assert!(parse(b"blob12\0").is_err());
    }

    #[test]
    fn garbage_size() {
        assert!(parse(b"blob 1x2\0").is_err());
        assert!(parse(b"blob -4\0").is_err());
    }

    #[test]
    fn unknown_kind() {
        assert!(matches!(
            parse(b"archive 4\0").unwrap_err(),
            ObjectError::UnknownKind(_)
        ));
    }
}
