//! Two-pass graph serializer.
//!
//! # Save
//!
//! Objects are visited breadth-first from the root. The first time an object
//! is referenced it is given the next slot index (the root is slot 0) and
//! queued; every later reference reuses that index. Each queued object is then
//! written as one record: its type tag followed by its fields.
//!
//! # Load
//!
//! 1. **Construct.** Records are read in order. Each one becomes a bare
//!    instance of its class with all by-value data decoded; references are
//!    recorded as slot indices.
//! 2. **Check.** Slot indices must name an existing record and the owning
//!    references must form a forest.
//! 3. **Wire.** Every reference field is assigned its target object.
//!
//! Because no reference is followed while records are still being read,
//! forward references and cycles need no special casing.

pub(crate) mod load;
mod ownership;
pub(crate) mod save;

use crate::config::{LoadConfig, SaveConfig};
use crate::error::{DeserializeError, SerializeError};
use crate::handle::ObjectHandle;
use crate::registry::Registry;
use crate::resource::ResourceCache;
use crate::tag::TypeTag;

use load::{LoadSession, LoadState};
use save::{SaveSession, SaveState};

/// Which reference taxonomy a slot index was written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    Owning,
    Shared,
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Writes object graphs to bytes.
///
/// Reusable: the identity table and output buffer are cleared at the start
/// of every [`save`](Self::save) and their allocations kept.
pub struct Serializer<'r> {
    registry: &'r Registry,
    config: SaveConfig,
    state: SaveState,
}

impl<'r> Serializer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            config: SaveConfig::default(),
            state: SaveState::default(),
        }
    }

    pub fn with_config(mut self, config: SaveConfig) -> Self {
        self.config = config;
        self
    }

    /// Serializes everything reachable from `root`.
    pub fn save(&mut self, root: &ObjectHandle) -> Result<Vec<u8>, SerializeError> {
        let result = SaveSession::new(self.registry, &self.config, &mut self.state).run(root);
        self.state.clear();
        result
    }
}

// ---------------------------------------------------------------------------
// Deserializer
// ---------------------------------------------------------------------------

/// Rebuilds object graphs from bytes.
///
/// Reusable like [`Serializer`]. Resource-backed shared references are bound
/// through the cache given to [`with_resource_cache`](Self::with_resource_cache);
/// without one they always bind to the freshly loaded instance.
pub struct Deserializer<'r> {
    registry: &'r Registry,
    config: LoadConfig,
    cache: Option<&'r dyn ResourceCache>,
    state: LoadState,
}

impl<'r> Deserializer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            config: LoadConfig::default(),
            cache: None,
            state: LoadState::default(),
        }
    }

    pub fn with_config(mut self, config: LoadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resource_cache(mut self, cache: &'r dyn ResourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Reconstructs the graph encoded in `bytes`.
    ///
    /// On error every object constructed so far is dropped and the resource
    /// cache is left untouched.
    pub fn load(&mut self, bytes: &[u8]) -> Result<LoadedGraph, DeserializeError> {
        let session = LoadSession {
            registry: self.registry,
            config: &self.config,
            cache: self.cache,
            state: &mut self.state,
        };
        let result = session.run(bytes);
        self.state.clear();
        result
    }
}

// ---------------------------------------------------------------------------
// LoadedGraph
// ---------------------------------------------------------------------------

/// Result of a successful load.
///
/// Holds the root and every other object no owning reference holds. Objects
/// reachable only through shared references stay alive as long as this
/// value does.
pub struct LoadedGraph {
    root: ObjectHandle,
    retained: Vec<ObjectHandle>,
    record_tags: Vec<TypeTag>,
}

impl LoadedGraph {
    pub fn root(&self) -> &ObjectHandle {
        &self.root
    }

    /// Most-derived class tag of the root.
    pub fn root_tag(&self) -> TypeTag {
        self.root.tag()
    }

    /// Class tag of every record, in slot order.
    pub fn record_tags(&self) -> &[TypeTag] {
        &self.record_tags
    }

    pub fn record_count(&self) -> usize {
        self.record_tags.len()
    }

    /// Objects held by no owning reference, in slot order.
    pub fn retained(&self) -> &[ObjectHandle] {
        &self.retained
    }

    /// Releases everything but the root.
    ///
    /// Unowned objects other than the root are dropped, so shared references
    /// to them dangle unless something else keeps them alive.
    pub fn into_root(self) -> (ObjectHandle, TypeTag) {
        let tag = self.root.tag();
        (self.root, tag)
    }
}

impl std::fmt::Debug for LoadedGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedGraph")
            .field("root", &self.root)
            .field("records", &self.record_tags.len())
            .field("retained", &self.retained.len())
            .finish()
    }
}

/// Serializes `root` with a one-shot [`Serializer`].
pub fn save(registry: &Registry, root: &ObjectHandle) -> Result<Vec<u8>, SerializeError> {
    Serializer::new(registry).save(root)
}

/// Loads `bytes` with a one-shot [`Deserializer`] and no resource cache.
pub fn load(registry: &Registry, bytes: &[u8]) -> Result<LoadedGraph, DeserializeError> {
    Deserializer::new(registry).load(bytes)
}
