//! Abbreviated object name resolution.

use std::collections::BTreeSet;

use grit_hash::{hex, ObjectName};

use crate::{ObjectStore, OdbError};

/// Shortest accepted abbreviation, matching what repositories print.
const MIN_PREFIX: usize = 4;

/// Resolve a hex prefix to the one object name it abbreviates.
///
/// Both tiers are consulted. Zero matches and multiple matches are
/// distinct errors; a full 40-character name short-circuits into a plain
/// existence check.
pub fn resolve_prefix(store: &ObjectStore, prefix: &str) -> Result<ObjectName, OdbError> {
    if prefix.len() == 40 {
        let name = ObjectName::from_hex(prefix)?;
        return if store.contains(&name) {
            Ok(name)
        } else {
            Err(OdbError::NotFound(name))
        };
    }

    if prefix.len() < MIN_PREFIX
        || prefix.len() > 40
        || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(OdbError::InvalidPrefix(prefix.to_string()));
    }
    let prefix_lower = prefix.to_ascii_lowercase();

    let mut matches: BTreeSet<ObjectName> = BTreeSet::new();

    for result in store.loose_names() {
        let name = result?;
        if name.to_hex().starts_with(&prefix_lower) {
            matches.insert(name);
        }
    }

    // The prefix pins down at least the first name byte, which bounds
    // the scan to one fan-out bucket's worth of index rows.
    let bucket = first_byte_of(&prefix_lower);
    for (index, _) in store.pack_indexes() {
        for (name, _) in index.iter() {
            if Some(name.first_byte()) != bucket {
                continue;
            }
            if name.to_hex().starts_with(&prefix_lower) {
                matches.insert(name);
            }
        }
    }

    let mut iter = matches.into_iter();
    match (iter.next(), iter.next()) {
        (Some(name), None) => Ok(name),
        (None, _) => Err(OdbError::PrefixNotFound(prefix.to_string())),
        (Some(_), Some(_)) => Err(OdbError::AmbiguousPrefix(prefix.to_string())),
    }
}

/// The byte the prefix pins down, when it covers two hex digits.
fn first_byte_of(prefix: &str) -> Option<u8> {
    if prefix.len() < 2 {
        return None;
    }
    hex::decode(&prefix[..2]).ok().map(|bytes| bytes[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_object::ObjectKind;

    #[test]
    fn unique_prefix_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();

        let name = store.write(ObjectKind::Blob, b"hello\n").unwrap();
        // ce013625...
        assert_eq!(resolve_prefix(&store, "ce01").unwrap(), name);
        assert_eq!(resolve_prefix(&store, "ce013625").unwrap(), name);
        assert_eq!(resolve_prefix(&store, &name.to_hex()).unwrap(), name);
    }

    #[test]
    fn unmatched_prefix_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        store.write(ObjectKind::Blob, b"hello\n").unwrap();

        assert!(matches!(
            resolve_prefix(&store, "dead").unwrap_err(),
            OdbError::PrefixNotFound(_)
        ));
    }

    #[test]
    fn short_or_malformed_prefix_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();

        for bad in ["", "ce", "ce0", "ce0g", "not-hex!"] {
            assert!(matches!(
                resolve_prefix(&store, bad).unwrap_err(),
                OdbError::InvalidPrefix(_)
            ));
        }
    }

    #[test]
    fn colliding_prefix_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();

        // Birthday-search a pair of payloads whose blob names share their
        // first two bytes; a few hundred probes is enough for 16 bits.
        let mut seen: std::collections::HashMap<[u8; 2], String> =
            std::collections::HashMap::new();
        let mut ambiguous_prefix = None;
        for i in 0u32..5000 {
            let payload = format!("probe-{i}");
            let name = grit_hash::hasher::hash_object("blob", payload.as_bytes()).unwrap();
            let bucket = [name.as_bytes()[0], name.as_bytes()[1]];
            if let Some(earlier) = seen.get(&bucket) {
                store.write(ObjectKind::Blob, earlier.as_bytes()).unwrap();
                store.write(ObjectKind::Blob, payload.as_bytes()).unwrap();
                ambiguous_prefix = Some(name.to_hex()[..4].to_string());
                break;
            }
            seen.insert(bucket, payload);
        }
        let prefix = ambiguous_prefix.expect("no collision in 5000 probes");

        assert!(matches!(
            resolve_prefix(&store, &prefix).unwrap_err(),
            OdbError::AmbiguousPrefix(_)
        ));
    }

    #[test]
    fn full_name_of_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();

        let absent = "ffffffffffffffffffffffffffffffffffffffff";
        assert!(matches!(
            resolve_prefix(&store, absent).unwrap_err(),
            OdbError::NotFound(_)
        ));
    }
}
