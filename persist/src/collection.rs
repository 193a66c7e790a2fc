//! Collection adapters.
//!
//! Each adapter writes a `u32` element count followed by the elements. What
//! differs is who owns the elements once loaded:
//!
//! | Adapter | Elements on the wire | Owner frees |
//! |---|---|---|
//! | [`ValueListField`] | raw `Pod` bytes | nothing to free |
//! | [`ObjectListField`] | embedded records | every element (held by value) |
//! | [`OwnedListField`] | slot indices | every referent ([`Owned`]) |
//! | [`SharedListField`] | slot indices | no referent ([`Shared`]) |
//!
//! Reference lists are resized during pass 1 so that pass 2 knows how many
//! slots belong to the list; the placeholder elements are null until wired.

use std::mem::size_of;

use crate::class::Class;
use crate::error::{DeserializeError, SerializeError};
use crate::fields::FieldCodec;
use crate::handle::{ObjectHandle, Owned, Shared};
use crate::serializer::load::{RecordReader, Wiring};
use crate::serializer::save::SaveSession;
use crate::serializer::RefKind;
use crate::tag::TypeTag;

/// Smallest encoding of one slot index or one record tag.
const MIN_REF_WIDTH: usize = size_of::<u32>();

pub(crate) struct ValueListField<T, V> {
    pub get: fn(&T) -> &Vec<V>,
    pub get_mut: fn(&mut T) -> &mut Vec<V>,
}

impl<T, V: bytemuck::Pod> FieldCodec<T> for ValueListField<T, V> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        let values = (self.get)(owner);
        let enc = out.encoder();
        enc.write_len(values.len())?;
        enc.write_pod_slice(values);
        Ok(())
    }

    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        let count = input.read_count(size_of::<V>())?;
        *(self.get_mut)(owner) = input.decoder().read_pod_vec(count)?;
        Ok(())
    }
}

pub(crate) struct ObjectListField<T, B> {
    pub name: &'static str,
    pub get: fn(&T) -> &Vec<B>,
    pub get_mut: fn(&mut T) -> &mut Vec<B>,
}

impl<T, B: Class> FieldCodec<T> for ObjectListField<T, B> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        let items = (self.get)(owner);
        out.encoder().write_len(items.len())?;
        for item in items {
            out.write_embedded(item)?;
        }
        Ok(())
    }

    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        let count = input.read_count(TypeTag::WIDTH)?;
        let items = (self.get_mut)(owner);
        items.clear();
        items.reserve(count);
        for _ in 0..count {
            let mut item = B::default();
            input.read_embedded(self.name, &mut item)?;
            items.push(item);
        }
        Ok(())
    }

    fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        for item in (self.get_mut)(owner).iter_mut() {
            wiring.wire_embedded(item)?;
        }
        Ok(())
    }
}

pub(crate) struct OwnedListField<T, C> {
    pub name: &'static str,
    pub get: fn(&T) -> &Vec<Owned<C>>,
    pub get_mut: fn(&mut T) -> &mut Vec<Owned<C>>,
}

impl<T, C: Class> FieldCodec<T> for OwnedListField<T, C> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        let items = (self.get)(owner);
        out.encoder().write_len(items.len())?;
        for item in items {
            let target = item
                .get()
                .map(|handle| ObjectHandle::from_handle(handle.clone()));
            out.write_ref(target, RefKind::Owning)?;
        }
        Ok(())
    }

    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        let count = input.read_count(MIN_REF_WIDTH)?;
        for _ in 0..count {
            input.read_ref(RefKind::Owning)?;
        }
        let items = (self.get_mut)(owner);
        items.clear();
        items.resize_with(count, Owned::none);
        Ok(())
    }

    fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        for item in (self.get_mut)(owner).iter_mut() {
            *item = wiring.next_owned(self.name)?;
        }
        Ok(())
    }
}

pub(crate) struct SharedListField<T, C> {
    pub name: &'static str,
    pub get: fn(&T) -> &Vec<Shared<C>>,
    pub get_mut: fn(&mut T) -> &mut Vec<Shared<C>>,
    pub resource: bool,
}

impl<T, C: Class> FieldCodec<T> for SharedListField<T, C> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        let items = (self.get)(owner);
        out.encoder().write_len(items.len())?;
        for item in items {
            out.write_shared(self.name, item)?;
        }
        Ok(())
    }

    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        let count = input.read_count(MIN_REF_WIDTH)?;
        for _ in 0..count {
            input.read_ref(RefKind::Shared)?;
        }
        let items = (self.get_mut)(owner);
        items.clear();
        items.resize_with(count, Shared::none);
        Ok(())
    }

    fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        for item in (self.get_mut)(owner).iter_mut() {
            *item = wiring.next_shared(self.name, self.resource)?;
        }
        Ok(())
    }
}
