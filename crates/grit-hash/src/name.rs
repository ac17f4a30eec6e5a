use std::fmt;
use std::str::FromStr;

use crate::hex;
use crate::HashError;

/// Length of an object name in bytes.
pub const NAME_LEN: usize = 20;

/// A 20-byte SHA-1 object name.
///
/// Ordered by byte comparison; the hex form is lowercase and 40 characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName([u8; NAME_LEN]);

impl ObjectName {
    /// The all-zeros name.
    pub const NULL: Self = Self([0u8; NAME_LEN]);

    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; NAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy from a byte slice, which must be exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != NAME_LEN {
            return Err(HashError::InvalidNameLength {
                expected: NAME_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; NAME_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Parse a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let mut arr = [0u8; NAME_LEN];
        hex::decode_into(s, &mut arr)?;
        Ok(Self(arr))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// Lowercase 40-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// First digest byte, used for fan-out indexing.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// True for the all-zeros name.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Relative path of the loose object file: `"xx/yyyy..."`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectName({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectName {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for ObjectName {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
