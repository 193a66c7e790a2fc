//! Save pass: slot assignment and record emission.

use std::collections::{HashMap, VecDeque};

use crate::class::Class;
use crate::config::{DanglingShared, SaveConfig};
use crate::error::SerializeError;
use crate::handle::{ObjectHandle, Shared};
use crate::registry::Registry;
use crate::stream::{Encoder, NULL_SLOT};
use crate::tag::TypeTag;

use super::ownership::OwnerTable;
use super::RefKind;

/// Tables owned by a [`Serializer`](super::Serializer) and reused across calls.
#[derive(Default)]
pub(crate) struct SaveState {
    out: Encoder,
    /// Object of every assigned slot. Holds the graph alive for the call so
    /// that identities stay unique.
    objects: Vec<ObjectHandle>,
    slots: HashMap<usize, u32>,
    queue: VecDeque<u32>,
    owners: OwnerTable,
    current: u32,
}

impl SaveState {
    pub fn clear(&mut self) {
        self.out.clear();
        self.objects.clear();
        self.slots.clear();
        self.queue.clear();
        self.owners.clear();
        self.current = 0;
    }
}

/// One in-progress save.
pub(crate) struct SaveSession<'s> {
    registry: &'s Registry,
    config: &'s SaveConfig,
    state: &'s mut SaveState,
}

impl<'s> SaveSession<'s> {
    pub(super) fn new(registry: &'s Registry, config: &'s SaveConfig, state: &'s mut SaveState) -> Self {
        Self {
            registry,
            config,
            state,
        }
    }

    pub(super) fn run(mut self, root: &ObjectHandle) -> Result<Vec<u8>, SerializeError> {
        self.state.clear();
        self.slot_for(root)?;

        let registry = self.registry;
        while let Some(slot) = self.state.queue.pop_front() {
            let object = self.state.objects[slot as usize].clone();
            let descriptor = registry
                .lookup(object.tag())
                .map_err(|_| unregistered(object.tag()))?;
            log::trace!("save slot {slot}: {} {}", object.tag(), descriptor.name());

            self.state.current = slot;
            self.state.out.write_tag(object.tag());
            descriptor.ops().save_object(&object, &mut self)?;
        }

        log::debug!(
            "saved {} records ({} bytes), root {}",
            self.state.objects.len(),
            self.state.out.len(),
            root.tag()
        );
        Ok(self.state.out.take())
    }

    pub(crate) fn encoder(&mut self) -> &mut Encoder {
        &mut self.state.out
    }

    /// Returns the slot of `object`, assigning and queueing one on first sight.
    fn slot_for(&mut self, object: &ObjectHandle) -> Result<u32, SerializeError> {
        let identity = object.identity();
        if let Some(&slot) = self.state.slots.get(&identity) {
            return Ok(slot);
        }
        let slot = u32::try_from(self.state.objects.len())
            .ok()
            .filter(|&slot| slot != NULL_SLOT)
            .ok_or(SerializeError::SlotOverflow)?;
        self.state.slots.insert(identity, slot);
        self.state.objects.push(object.clone());
        self.state.owners.push_unowned();
        self.state.queue.push_back(slot);
        Ok(slot)
    }

    /// Writes the slot index of `target`, or the null slot.
    pub(crate) fn write_ref(
        &mut self,
        target: Option<ObjectHandle>,
        kind: RefKind,
    ) -> Result<(), SerializeError> {
        let slot = match target {
            Some(object) => {
                let slot = self.slot_for(&object)?;
                if kind == RefKind::Owning {
                    self.state.owners.claim(self.state.current, slot)?;
                }
                Some(slot)
            }
            None => None,
        };
        self.state.out.write_slot(slot);
        Ok(())
    }

    pub(crate) fn write_shared<C: Class>(
        &mut self,
        field: &'static str,
        shared: &Shared<C>,
    ) -> Result<(), SerializeError> {
        if let Some(handle) = shared.upgrade() {
            return self.write_ref(Some(ObjectHandle::from_handle(handle)), RefKind::Shared);
        }
        if shared.is_dangling() {
            match self.config.dangling_shared {
                DanglingShared::Error => return Err(SerializeError::DanglingShared { field }),
                DanglingShared::WriteNull => {
                    log::warn!(
                        "shared reference '{field}' in slot {} points at a dropped object, writing null",
                        self.state.current
                    );
                }
            }
        }
        self.write_ref(None, RefKind::Shared)
    }

    /// Writes a nested record: its tag, then its fields.
    pub(crate) fn write_embedded<B: Class>(&mut self, value: &B) -> Result<(), SerializeError> {
        let registry = self.registry;
        let descriptor = registry.lookup(B::TAG).map_err(|_| unregistered(B::TAG))?;
        self.state.out.write_tag(B::TAG);
        descriptor.ops().save_value(value, self)
    }
}

fn unregistered(tag: TypeTag) -> SerializeError {
    log::error!("cannot save object of unregistered class {tag}");
    SerializeError::UnregisteredClass { tag }
}
