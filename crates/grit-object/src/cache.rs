//! LRU cache for parsed objects.

use std::num::NonZeroUsize;

use grit_hash::ObjectName;
use lru::LruCache;

use crate::Object;

/// Bounded cache of parsed objects keyed by name.
///
/// Objects are immutable once stored, so cached values never go stale.
pub struct ObjectCache {
    inner: LruCache<ObjectName, Object>,
}

impl ObjectCache {
    /// Create a cache holding up to `capacity` objects.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Fetch and promote to most recently used.
    pub fn get(&mut self, name: &ObjectName) -> Option<&Object> {
        self.inner.get(name)
    }

    /// Store an object, evicting the least recently used when full.
    pub fn insert(&mut self, name: ObjectName, obj: Object) {
        self.inner.push(name, obj);
    }

    pub fn contains(&self, name: &ObjectName) -> bool {
        self.inner.contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
