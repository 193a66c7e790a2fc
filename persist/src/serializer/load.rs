//! Load passes: construction, checks, and wiring.

use std::collections::HashMap;
use std::ops::Range;

use crate::class::Class;
use crate::config::LoadConfig;
use crate::error::DeserializeError;
use crate::handle::{Handle, ObjectHandle, Owned, Shared};
use crate::registry::Registry;
use crate::resource::ResourceCache;
use crate::stream::Decoder;
use crate::tag::TypeTag;

use super::ownership::OwnerTable;
use super::{LoadedGraph, RefKind};

/// A reference read in pass 1, resolved in pass 2.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingRef {
    slot: Option<u32>,
    kind: RefKind,
}

/// Tables owned by a [`Deserializer`](super::Deserializer) and reused across
/// calls.
#[derive(Default)]
pub(crate) struct LoadState {
    objects: Vec<ObjectHandle>,
    /// Byte offset of each record.
    offsets: Vec<usize>,
    keys: Vec<Option<String>>,
    /// References of all records, flattened in stream order.
    refs: Vec<PendingRef>,
    /// Index into `refs` of the first reference of each record.
    ref_starts: Vec<usize>,
    owners: OwnerTable,
    bound: HashMap<(TypeTag, String), ObjectHandle>,
    inserts: Vec<(String, ObjectHandle)>,
}

impl LoadState {
    pub fn clear(&mut self) {
        self.objects.clear();
        self.offsets.clear();
        self.keys.clear();
        self.refs.clear();
        self.ref_starts.clear();
        self.owners.clear();
        self.bound.clear();
        self.inserts.clear();
    }

    fn refs_of(&self, record: usize) -> Range<usize> {
        let start = self.ref_starts[record];
        let end = self
            .ref_starts
            .get(record + 1)
            .copied()
            .unwrap_or(self.refs.len());
        start..end
    }
}

// ---------------------------------------------------------------------------
// Pass 1
// ---------------------------------------------------------------------------

/// Reads the fields of one record during pass 1.
pub(crate) struct RecordReader<'s, 'b> {
    registry: &'s Registry,
    config: &'s LoadConfig,
    decoder: &'s mut Decoder<'b>,
    refs: &'s mut Vec<PendingRef>,
}

impl<'s, 'b> RecordReader<'s, 'b> {
    pub(crate) fn decoder(&mut self) -> &mut Decoder<'b> {
        self.decoder
    }

    /// Reads one slot index and remembers it for pass 2.
    pub(crate) fn read_ref(&mut self, kind: RefKind) -> Result<(), DeserializeError> {
        let slot = self.decoder.read_slot()?;
        self.refs.push(PendingRef { slot, kind });
        Ok(())
    }

    /// Reads a collection count.
    ///
    /// `min_width` is the smallest encoded size of one element; counts that
    /// cannot fit in the rest of the buffer are rejected before anything is
    /// allocated.
    pub(crate) fn read_count(&mut self, min_width: usize) -> Result<usize, DeserializeError> {
        let offset = self.decoder.position();
        let count = self.decoder.read_u32()?;
        let limit = self.config.max_collection_len;
        if count > limit {
            return Err(DeserializeError::LimitExceeded {
                what: "collection length",
                limit,
                found: u64::from(count),
            });
        }
        let count = count as usize;
        let needed = count.saturating_mul(min_width);
        let remaining = self.decoder.remaining();
        if needed > remaining {
            return Err(DeserializeError::TruncatedStream {
                offset: offset + 4,
                needed: needed - remaining,
            });
        }
        Ok(count)
    }

    /// Reads a nested record into `value`, checking its tag first.
    pub(crate) fn read_embedded<B: Class>(
        &mut self,
        field: &'static str,
        value: &mut B,
    ) -> Result<(), DeserializeError> {
        let offset = self.decoder.position();
        let tag = self.decoder.read_tag()?;
        let registry = self.registry;
        if tag != B::TAG {
            return Err(if registry.contains(tag) {
                DeserializeError::TypeMismatch {
                    field,
                    expected: B::NAME,
                    found: tag,
                }
            } else {
                DeserializeError::UnknownClass { tag, offset }
            });
        }
        let descriptor = registry
            .lookup(tag)
            .map_err(|_| DeserializeError::UnknownClass { tag, offset })?;
        descriptor.ops().load_value(value, self)
    }
}

// ---------------------------------------------------------------------------
// Pass 2
// ---------------------------------------------------------------------------

/// Hands out the targets of one record's references during pass 2.
///
/// References are consumed in the order pass 1 recorded them, which is the
/// field order.
pub(crate) struct Wiring<'s> {
    registry: &'s Registry,
    /// Byte offset of the record being wired.
    offset: usize,
    objects: &'s [ObjectHandle],
    keys: &'s [Option<String>],
    refs: std::slice::Iter<'s, PendingRef>,
    cache: Option<&'s dyn ResourceCache>,
    bound: &'s mut HashMap<(TypeTag, String), ObjectHandle>,
    inserts: &'s mut Vec<(String, ObjectHandle)>,
}

impl<'s> Wiring<'s> {
    fn next_slot(&mut self) -> Option<u32> {
        self.refs.next().and_then(|pending| pending.slot)
    }

    pub(crate) fn next_owned<C: Class>(
        &mut self,
        field: &'static str,
    ) -> Result<Owned<C>, DeserializeError> {
        match self.next_slot() {
            Some(slot) => {
                let object = &self.objects[slot as usize];
                Ok(Owned::from_handle(typed::<C>(field, object)?))
            }
            None => Ok(Owned::none()),
        }
    }

    pub(crate) fn next_shared<C: Class>(
        &mut self,
        field: &'static str,
        resource: bool,
    ) -> Result<Shared<C>, DeserializeError> {
        let Some(slot) = self.next_slot() else {
            return Ok(Shared::none());
        };
        let object = if resource {
            self.bind_resource(slot)
        } else {
            self.objects[slot as usize].clone()
        };
        Ok(Shared::to(&typed::<C>(field, &object)?))
    }

    /// Resolves a resource-backed reference to `slot`.
    ///
    /// Without a cache the reference keeps the loaded object. With one, each
    /// (class, key) pair is looked up once per load and later references to
    /// it reuse the first answer. A resident object of another class under
    /// the same key is not bound.
    fn bind_resource(&mut self, slot: u32) -> ObjectHandle {
        let objects = self.objects;
        let keys = self.keys;
        let loaded = &objects[slot as usize];
        let (Some(cache), Some(key)) = (self.cache, &keys[slot as usize]) else {
            return loaded.clone();
        };
        let identity = (loaded.tag(), key.clone());
        if let Some(bound) = self.bound.get(&identity) {
            return bound.clone();
        }

        let chosen = match cache.lookup_resource(key) {
            Some(resident) if resident.tag() == loaded.tag() => {
                log::trace!("resource '{key}' bound to the resident instance");
                resident
            }
            Some(resident) => {
                log::warn!(
                    "resource '{key}' is resident as class {}, keeping the loaded {}",
                    resident.tag(),
                    loaded.tag()
                );
                loaded.clone()
            }
            None => {
                if !self.inserts.iter().any(|(pending, _)| pending == key) {
                    self.inserts.push((key.clone(), loaded.clone()));
                }
                loaded.clone()
            }
        };
        self.bound.insert(identity, chosen.clone());
        chosen
    }

    pub(crate) fn wire_embedded<B: Class>(&mut self, value: &mut B) -> Result<(), DeserializeError> {
        let registry = self.registry;
        let descriptor = registry
            .lookup(B::TAG)
            .map_err(|_| DeserializeError::UnknownClass {
                tag: B::TAG,
                offset: self.offset,
            })?;
        descriptor.ops().wire_value(value, self)
    }
}

fn typed<C: Class>(field: &'static str, object: &ObjectHandle) -> Result<Handle<C>, DeserializeError> {
    object
        .downcast::<C>()
        .ok_or(DeserializeError::TypeMismatch {
            field,
            expected: C::NAME,
            found: object.tag(),
        })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub(crate) struct LoadSession<'s> {
    pub registry: &'s Registry,
    pub config: &'s LoadConfig,
    pub cache: Option<&'s dyn ResourceCache>,
    pub state: &'s mut LoadState,
}

impl LoadSession<'_> {
    pub(super) fn run(mut self, bytes: &[u8]) -> Result<LoadedGraph, DeserializeError> {
        self.state.clear();
        if bytes.is_empty() {
            return Err(DeserializeError::TruncatedStream {
                offset: 0,
                needed: TypeTag::WIDTH,
            });
        }

        self.construct(bytes)?;
        let records = self.state.objects.len() as u32;
        self.check_references(records)?;
        self.wire()?;

        if let Some(cache) = self.cache {
            for (key, object) in self.state.inserts.drain(..) {
                cache.cache_resource(&key, object);
            }
        }

        let state = &*self.state;
        let retained = (0..state.objects.len())
            .filter(|&slot| !state.owners.is_owned(slot))
            .map(|slot| state.objects[slot].clone())
            .collect();
        let graph = LoadedGraph {
            root: state.objects[0].clone(),
            retained,
            record_tags: state.objects.iter().map(ObjectHandle::tag).collect(),
        };
        log::debug!(
            "loaded {records} records ({} bytes), root {}",
            bytes.len(),
            graph.root_tag()
        );
        Ok(graph)
    }

    /// Pass 1.
    fn construct(&mut self, bytes: &[u8]) -> Result<(), DeserializeError> {
        let registry = self.registry;
        let mut decoder = Decoder::new(bytes);
        while !decoder.is_at_end() {
            let count = self.state.objects.len();
            if count >= self.config.max_records as usize {
                return Err(DeserializeError::LimitExceeded {
                    what: "record count",
                    limit: self.config.max_records,
                    found: count as u64 + 1,
                });
            }

            let offset = decoder.position();
            let tag = decoder.read_tag()?;
            let descriptor = registry
                .lookup(tag)
                .map_err(|_| DeserializeError::UnknownClass { tag, offset })?;
            log::trace!("load slot {count}: {tag} {} at byte {offset}", descriptor.name());

            self.state.ref_starts.push(self.state.refs.len());
            let mut reader = RecordReader {
                registry,
                config: self.config,
                decoder: &mut decoder,
                refs: &mut self.state.refs,
            };
            let (object, key) = descriptor.ops().construct(&mut reader)?;
            self.state.objects.push(object);
            self.state.offsets.push(offset);
            self.state.keys.push(key);
        }
        Ok(())
    }

    /// Slot range and ownership checks, before anything is wired.
    fn check_references(&mut self, records: u32) -> Result<(), DeserializeError> {
        let state = &mut *self.state;
        state.owners.reset(records as usize);
        for record in 0..state.objects.len() {
            let range = state.refs_of(record);
            for pending in &state.refs[range] {
                let Some(slot) = pending.slot else { continue };
                if slot >= records {
                    return Err(DeserializeError::DanglingSlot { slot, records });
                }
                if pending.kind == RefKind::Owning {
                    state.owners.claim(record as u32, slot)?;
                }
            }
        }
        Ok(())
    }

    /// Pass 2.
    fn wire(&mut self) -> Result<(), DeserializeError> {
        let registry = self.registry;
        let cache = self.cache;
        let state = &mut *self.state;
        for record in 0..state.objects.len() {
            let range = state.refs_of(record);
            let object = &state.objects[record];
            let offset = state.offsets[record];
            let descriptor = registry
                .lookup(object.tag())
                .map_err(|_| DeserializeError::UnknownClass {
                    tag: object.tag(),
                    offset,
                })?;
            let mut wiring = Wiring {
                registry,
                offset,
                objects: &state.objects,
                keys: &state.keys,
                refs: state.refs[range].iter(),
                cache,
                bound: &mut state.bound,
                inserts: &mut state.inserts,
            };
            descriptor.ops().wire_object(object, &mut wiring)?;
        }
        Ok(())
    }
}
