//! Resource cache seam.
//!
//! Resource-backed shared references (declared with
//! [`Fields::resource`](crate::Fields::resource)) bind to an instance already
//! resident in the engine's resource cache when one exists under the same
//! key, instead of the copy stored in the stream.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::handle::ObjectHandle;

/// Name-keyed store of resident resources.
///
/// Both methods take `&self`; implementations synchronise internally.
pub trait ResourceCache {
    /// Returns the resident instance for `key`, if any.
    fn lookup_resource(&self, key: &str) -> Option<ObjectHandle>;

    /// Makes `object` the resident instance for `key`.
    ///
    /// Called once per newly loaded resource, after the load succeeded.
    fn cache_resource(&self, key: &str, object: ObjectHandle);
}

/// In-memory [`ResourceCache`].
///
/// Holds strong handles, so cached resources stay alive until removed.
#[derive(Default)]
pub struct MemoryResourceCache {
    entries: RwLock<HashMap<String, ObjectHandle>>,
}

impl MemoryResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<ObjectHandle> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ResourceCache for MemoryResourceCache {
    fn lookup_resource(&self, key: &str) -> Option<ObjectHandle> {
        self.entries.read().get(key).cloned()
    }

    fn cache_resource(&self, key: &str, object: ObjectHandle) {
        self.entries.write().insert(key.to_owned(), object);
    }
}

impl std::fmt::Debug for MemoryResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryResourceCache")
            .field("keys", &self.keys())
            .finish()
    }
}
