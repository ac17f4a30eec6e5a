//! Recursive tree walking and path lookup over the object store.

use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectName;
use grit_object::{EntryMode, Object, Tree};

use crate::{ObjectStore, OdbError};

/// A non-tree row yielded by [`TreeWalker`], with its repo-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: BString,
    pub mode: EntryMode,
    pub id: ObjectName,
}

#[derive(Debug)]
struct Frame {
    tree: Tree,
    cursor: usize,
    /// The directory name this tree was reached through; empty at the root.
    component: BString,
}

/// Depth-first iterator over every non-tree row under a root tree.
///
/// The stack holds each level's local directory component, never a
/// qualified path; full paths are reassembled per yield. Subtrees are
/// loaded through the store's cache as they are entered.
#[derive(Debug)]
pub struct TreeWalker<'a> {
    store: &'a ObjectStore,
    stack: Vec<Frame>,
    poisoned: bool,
}

impl<'a> TreeWalker<'a> {
    /// Start a walk at the given root tree.
    pub fn new(store: &'a ObjectStore, root: &ObjectName) -> Result<Self, OdbError> {
        let tree = load_tree(store, root)?;
        Ok(Self {
            store,
            stack: vec![Frame {
                tree,
                cursor: 0,
                component: BString::default(),
            }],
            poisoned: false,
        })
    }

    fn qualify(&self, leaf: &BStr) -> BString {
        let mut path = BString::default();
        for frame in &self.stack {
            if !frame.component.is_empty() {
                path.extend_from_slice(&frame.component);
                path.push(b'/');
            }
        }
        path.extend_from_slice(leaf);
        path
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = Result<WalkEntry, OdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }
        loop {
            let frame = self.stack.last_mut()?;
            if frame.cursor >= frame.tree.entries.len() {
                self.stack.pop();
                continue;
            }
            let entry = frame.tree.entries[frame.cursor].clone();
            frame.cursor += 1;

            if entry.mode.is_tree() {
                match load_tree(self.store, &entry.id) {
                    Ok(tree) => {
                        self.stack.push(Frame {
                            tree,
                            cursor: 0,
                            component: entry.name,
                        });
                        continue;
                    }
                    Err(e) => {
                        self.poisoned = true;
                        return Some(Err(e));
                    }
                }
            }

            let path = self.qualify(entry.name.as_bstr());
            return Some(Ok(WalkEntry {
                path,
                mode: entry.mode,
                id: entry.id,
            }));
        }
    }
}

/// Navigate a slash-separated path from a root tree to a non-tree entry.
pub fn lookup_path(
    store: &ObjectStore,
    root: &ObjectName,
    path: &BStr,
) -> Result<ObjectName, OdbError> {
    let missing = || OdbError::NoFileInTree {
        path: BString::from(path),
    };

    let mut tree = load_tree(store, root)?;
    let mut segments = path.split_str("/").filter(|s| !s.is_empty()).peekable();

    while let Some(segment) = segments.next() {
        let (is_tree, id) = {
            let entry = tree.find(segment.as_bstr()).ok_or_else(missing)?;
            (entry.mode.is_tree(), entry.id)
        };

        if segments.peek().is_some() {
            // An inner segment must name a subtree.
            if !is_tree {
                return Err(missing());
            }
            tree = load_tree(store, &id)?;
        } else {
            if is_tree {
                return Err(OdbError::EntryIsTree {
                    path: BString::from(path),
                });
            }
            return Ok(id);
        }
    }

    Err(missing())
}

fn load_tree(store: &ObjectStore, name: &ObjectName) -> Result<Tree, OdbError> {
    match store.read_cached(name)? {
        Some(Object::Tree(tree)) => Ok(tree),
        Some(_) => Err(OdbError::NotATree(*name)),
        None => Err(OdbError::NotFound(*name)),
    }
}
