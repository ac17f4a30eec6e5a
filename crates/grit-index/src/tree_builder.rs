//! Flattening the path-keyed index into nested tree objects.

use std::collections::BTreeMap;

use bstr::{BString, ByteSlice};
use grit_hash::ObjectName;
use grit_object::{EntryMode, ObjectKind, Tree, TreeEntry};
use grit_odb::ObjectStore;

use crate::{Index, IndexError};

/// Transient nesting node, keyed by directory component.
#[derive(Default)]
struct StagingTree {
    subtrees: BTreeMap<BString, StagingTree>,
    leaves: Vec<TreeEntry>,
}

/// Convert the index into a persisted tree hierarchy, returning the root
/// tree's name.
///
/// Each entry's directory path is split into components and descended
/// through the staging structure, leaving the file as a leaf of its
/// innermost directory. Trees are then written bottom-up, each subtree's
/// name landing as a tree-mode row in its parent. An empty index produces
/// the empty tree.
pub fn index_to_tree(index: &Index, store: &ObjectStore) -> Result<ObjectName, IndexError> {
    let mut root = StagingTree::default();

    for entry in index.iter() {
        let (dir, file) = match entry.path.rfind_byte(b'/') {
            Some(at) => (&entry.path[..at], &entry.path[at + 1..]),
            None => (&b""[..], &entry.path[..]),
        };

        let mut node = &mut root;
        for component in dir.split_str("/").filter(|c| !c.is_empty()) {
            node = node.subtrees.entry(BString::from(component)).or_default();
        }
        node.leaves.push(TreeEntry {
            mode: entry.mode,
            name: BString::from(file),
            id: entry.id,
        });
    }

    persist(&root, store)
}

fn persist(node: &StagingTree, store: &ObjectStore) -> Result<ObjectName, IndexError> {
    let mut tree = Tree::new();

    for (name, subtree) in &node.subtrees {
        let id = persist(subtree, store)?;
        tree.entries.push(TreeEntry {
            mode: EntryMode::TREE,
            name: name.clone(),
            id,
        });
    }
    tree.entries.extend(node.leaves.iter().cloned());

    Ok(store.write(ObjectKind::Tree, &tree.serialize())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryFlags, IndexEntry, StatData};
    use bstr::BStr;
    use grit_object::Object;

    fn store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn entry(path: &str, fill: u8) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            id: ObjectName::new([fill; 20]),
            mode: EntryMode::REGULAR,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    fn read_tree(store: &ObjectStore, name: &ObjectName) -> Tree {
        match store.read(name).unwrap().unwrap() {
            Object::Tree(tree) => tree,
            other => panic!("expected tree, got {:?}", other.kind()),
        }
    }

    #[test]
    fn empty_index_writes_the_empty_tree() {
        let (_dir, store) = store();
        let root = index_to_tree(&Index::new(), &store).unwrap();
        assert_eq!(root.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn flat_index_is_one_tree() {
        let (_dir, store) = store();
        let mut index = Index::new();
        index.add(entry("b.txt", 1));
        index.add(entry("a.txt", 2));

        let root = read_tree(&store, &index_to_tree(&index, &store).unwrap());
        let names: Vec<_> = root.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert!(root.iter().all(|e| e.mode == EntryMode::REGULAR));
    }

    #[test]
    fn nested_paths_become_nested_trees() {
        let (_dir, store) = store();
        let mut index = Index::new();
        index.add(entry("a/b/c.txt", 1));
        index.add(entry("a/b/d.txt", 2));

        let root = read_tree(&store, &index_to_tree(&index, &store).unwrap());
        assert_eq!(root.len(), 1);
        let a = &root.entries[0];
        assert_eq!(a.name, "a");
        assert_eq!(a.mode, EntryMode::TREE);

        let a_tree = read_tree(&store, &a.id);
        assert_eq!(a_tree.len(), 1);
        let b = &a_tree.entries[0];
        assert_eq!(b.name, "b");
        assert_eq!(b.mode, EntryMode::TREE);

        let b_tree = read_tree(&store, &b.id);
        let names: Vec<_> = b_tree.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, ["c.txt", "d.txt"]);
    }

    #[test]
    fn files_and_directories_mix_at_one_level() {
        let (_dir, store) = store();
        let mut index = Index::new();
        index.add(entry("src/lib.rs", 1));
        index.add(entry("README.md", 2));

        let root = read_tree(&store, &index_to_tree(&index, &store).unwrap());
        assert_eq!(root.len(), 2);
        assert!(root.find(BStr::new("README.md")).unwrap().mode == EntryMode::REGULAR);
        assert!(root.find(BStr::new("src")).unwrap().mode == EntryMode::TREE);
    }

    #[test]
    fn insertion_order_does_not_change_the_root() {
        let (_dir, store) = store();

        let mut first = Index::new();
        first.add(entry("x/1.txt", 1));
        first.add(entry("y/2.txt", 2));
        first.add(entry("top.txt", 3));

        let mut second = Index::new();
        second.add(entry("top.txt", 3));
        second.add(entry("y/2.txt", 2));
        second.add(entry("x/1.txt", 1));

        assert_eq!(
            index_to_tree(&first, &store).unwrap(),
            index_to_tree(&second, &store).unwrap()
        );
    }
}
