use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectName;

use crate::ObjectError;

/// A tree row's mode word.
///
/// Bits 12..16 carry the object type (`0o04` tree, `0o10` regular file,
/// `0o12` symlink, `0o16` gitlink), bits 0..9 the unix permissions. The
/// same bitfield is stored verbatim in index entries, so the raw value is
/// always reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryMode(u32);

impl EntryMode {
    pub const REGULAR: Self = Self(0o100644);
    pub const EXECUTABLE: Self = Self(0o100755);
    pub const SYMLINK: Self = Self(0o120000);
    pub const GITLINK: Self = Self(0o160000);
    pub const TREE: Self = Self(0o040000);

    /// Wrap a raw mode word.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw mode word.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// The object-type nibble (bits 12..16).
    pub const fn kind_bits(&self) -> u32 {
        (self.0 >> 12) & 0o17
    }

    /// The unix permission bits (bits 0..9).
    pub const fn permissions(&self) -> u32 {
        self.0 & 0o777
    }

    pub const fn is_tree(&self) -> bool {
        self.kind_bits() == 0o04
    }

    pub const fn is_file(&self) -> bool {
        self.kind_bits() == 0o10
    }

    pub const fn is_symlink(&self) -> bool {
        self.kind_bits() == 0o12
    }

    pub const fn is_gitlink(&self) -> bool {
        self.kind_bits() == 0o16
    }

    /// Parse the ASCII octal form used in tree rows.
    pub fn from_octal(s: &[u8]) -> Result<Self, ObjectError> {
        if s.is_empty() || s.len() > 7 {
            return Err(ObjectError::Mode(String::from_utf8_lossy(s).into()));
        }
        let mut raw: u32 = 0;
        for &b in s {
            if !(b'0'..=b'7').contains(&b) {
                return Err(ObjectError::Mode(String::from_utf8_lossy(s).into()));
            }
            raw = (raw << 3) | u32::from(b - b'0');
        }
        Ok(Self(raw))
    }

    /// The ASCII octal form, without leading zeros.
    pub fn to_octal(&self) -> String {
        format!("{:o}", self.0)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_octal())
    }
}

/// One row of a tree: mode, name, and the named object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: BString,
    pub id: ObjectName,
}

/// A content-addressed directory listing.
///
/// On disk each row is `"<octal-mode> <name>\0"` followed by the raw
/// 20-byte object name, and rows are ordered by name bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse tree payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < payload.len() {
            let space = payload[pos..]
                .find_byte(b' ')
                .ok_or_else(|| ObjectError::TreeRow {
                    offset: pos,
                    reason: "missing space after mode".into(),
                })?
                + pos;
            let mode = EntryMode::from_octal(&payload[pos..space]).map_err(|_| {
                ObjectError::TreeRow {
                    offset: pos,
                    reason: "invalid mode".into(),
                }
            })?;

            let name_start = space + 1;
            let nul = payload[name_start..]
                .find_byte(0)
                .ok_or_else(|| ObjectError::TreeRow {
                    offset: name_start,
                    reason: "missing NUL after name".into(),
                })?
                + name_start;
            let name = BString::from(&payload[name_start..nul]);
            if name.is_empty() {
                return Err(ObjectError::TreeRow {
                    offset: name_start,
                    reason: "empty name".into(),
                });
            }

            let id_start = nul + 1;
            let id_end = id_start + grit_hash::NAME_LEN;
            if id_end > payload.len() {
                return Err(ObjectError::TreeRow {
                    offset: id_start,
                    reason: "truncated object name".into(),
                });
            }
            let id = ObjectName::from_bytes(&payload[id_start..id_end])?;

            entries.push(TreeEntry { mode, name, id });
            pos = id_end;
        }

        Ok(Self { entries })
    }

    /// Serialize to payload bytes, rows ordered by name bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut rows = self.entries.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::new();
        for row in &rows {
            out.extend_from_slice(row.mode.to_octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&row.name);
            out.push(0);
            out.extend_from_slice(row.id.as_bytes());
        }
        out
    }

    /// Sort rows into on-disk order in place.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Find a row by name.
    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: EntryMode, name: &str, fill: u8) -> TreeEntry {
        TreeEntry {
            mode,
            name: BString::from(name),
            id: ObjectName::new([fill; 20]),
        }
    }

    #[test]
    fn mode_kind_bits() {
        assert!(EntryMode::TREE.is_tree());
        assert!(EntryMode::REGULAR.is_file());
        assert!(EntryMode::EXECUTABLE.is_file());
        assert!(EntryMode::SYMLINK.is_symlink());
        assert!(EntryMode::GITLINK.is_gitlink());
        assert!(!EntryMode::REGULAR.is_tree());
    }

    #[test]
    fn mode_octal_roundtrip() {
        for mode in [
            EntryMode::REGULAR,
            EntryMode::EXECUTABLE,
            EntryMode::SYMLINK,
            EntryMode::GITLINK,
            EntryMode::TREE,
        ] {
            assert_eq!(
                EntryMode::from_octal(mode.to_octal().as_bytes()).unwrap(),
                mode
            );
        }
        // Trees serialize without a leading zero.
        assert_eq!(EntryMode::TREE.to_octal(), "40000");
    }

    #[test]
    fn mode_rejects_non_octal() {
        assert!(EntryMode::from_octal(b"100648").is_err());
        assert!(EntryMode::from_octal(b"").is_err());
        assert!(EntryMode::from_octal(b"10064400").is_err());
    }

    #[test]
    fn parse_empty() {
        assert!(Tree::parse(b"").unwrap().is_empty());
    }

    #[test]
    fn parse_single_row() {
        let id = ObjectName::new([0xab; 20]);
        let mut payload = Vec::new();
        payload.extend_from_slice(b"100644 hello.txt\0");
        payload.extend_from_slice(id.as_bytes());

        let tree = Tree::parse(&payload).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.entries[0].mode, EntryMode::REGULAR);
        assert_eq!(tree.entries[0].name, "hello.txt");
        assert_eq!(tree.entries[0].id, id);
    }

    #[test]
    fn parse_truncated_name_bytes() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"100644 short\0");
        payload.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            Tree::parse(&payload).unwrap_err(),
            ObjectError::TreeRow { .. }
        ));
    }

    #[test]
    fn serialize_orders_by_name_bytes() {
        let tree = Tree {
            entries: vec![
                entry(EntryMode::REGULAR, "zebra", 1),
                entry(EntryMode::TREE, "apple", 2),
                entry(EntryMode::REGULAR, "mango", 3),
            ],
        };
        let parsed = Tree::parse(&tree.serialize()).unwrap();
        let names: Vec<_> = parsed.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, ["apple", "mango", "zebra"]);
    }

    #[test]
    fn serialize_is_permutation_invariant() {
        let a = entry(EntryMode::REGULAR, "a.txt", 1);
        let b = entry(EntryMode::TREE, "dir", 2);
        let c = entry(EntryMode::SYMLINK, "link", 3);

        let t1 = Tree {
            entries: vec![a.clone(), b.clone(), c.clone()],
        };
        let t2 = Tree {
            entries: vec![c, a, b],
        };
        assert_eq!(t1.serialize(), t2.serialize());
    }

    #[test]
    fn find_by_name() {
        let tree = Tree {
            entries: vec![entry(EntryMode::REGULAR, "README", 1)],
        };
        assert!(tree.find(BStr::new("README")).is_some());
        assert!(tree.find(BStr::new("missing")).is_none());
    }

    #[test]
    fn roundtrip_preserves_rows() {
        let tree = Tree {
            entries: vec![
                entry(EntryMode::TREE, "src", 7),
                entry(EntryMode::EXECUTABLE, "run.sh", 9),
            ],
        };
        let parsed = Tree::parse(&tree.serialize()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.find(BStr::new("src")).unwrap().id, tree.entries[0].id);
        assert_eq!(
            parsed.find(BStr::new("run.sh")).unwrap().mode,
            EntryMode::EXECUTABLE
        );
    }
}
