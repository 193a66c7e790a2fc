//! Declarative field tables.
//!
//! A class lists its persistent fields by calling builder methods on
//! [`Fields`] from [`Class::describe`](crate::Class::describe). Each call
//! records a [`FieldInfo`] (name and kind) together with plain `fn` accessors
//! for the field. The call order is the wire order.
//!
//! | Method | Field type | Kind |
//! |---|---|---|
//! | [`value`](Fields::value) | any `serde` value | [`FieldKind::Value`] |
//! | [`embedded`](Fields::embedded), [`base`](Fields::base) | `B: Class` | [`FieldKind::Embedded`] |
//! | [`owned`](Fields::owned) | `Owned<C>` | [`FieldKind::OwningRef`] |
//! | [`shared`](Fields::shared), [`resource`](Fields::resource) | `Shared<C>` | [`FieldKind::SharedRef`] |
//! | [`value_list`](Fields::value_list) | `Vec<V: Pod>` | [`CollectionKind::Values`] |
//! | [`object_list`](Fields::object_list) | `Vec<B: Class>` | [`CollectionKind::Objects`] |
//! | [`owned_list`](Fields::owned_list) | `Vec<Owned<C>>` | [`CollectionKind::OwningRefs`] |
//! | [`shared_list`](Fields::shared_list), [`resource_list`](Fields::resource_list) | `Vec<Shared<C>>` | [`CollectionKind::SharedRefs`] |

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::class::Class;
use crate::collection::{ObjectListField, OwnedListField, SharedListField, ValueListField};
use crate::error::{DeserializeError, SerializeError};
use crate::handle::{ObjectHandle, Owned, Shared};
use crate::serializer::load::{RecordReader, Wiring};
use crate::serializer::save::SaveSession;
use crate::serializer::RefKind;

/// How a field is stored and who owns what it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw value bytes, inline.
    Value,
    /// A nested record, inline in the owner's record.
    Embedded,
    /// Slot index of an object the owner is responsible for.
    OwningRef,
    /// Slot index of an object the owner does not free.
    SharedRef {
        /// Bound through the resource cache on load.
        resource: bool,
    },
    /// Element count followed by per-element payloads.
    Collection(CollectionKind),
}

/// Element storage of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Fixed-width plain values; nothing owned.
    Values,
    /// Embedded records; the owner holds every element by value.
    Objects,
    /// Slot indices; the owner frees every referent.
    OwningRefs,
    /// Slot indices; the owner frees none of the referents.
    SharedRefs {
        /// Bound through the resource cache on load.
        resource: bool,
    },
}

/// Name and kind of one declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub kind: FieldKind,
}

// ---------------------------------------------------------------------------
// Field codecs
// ---------------------------------------------------------------------------

/// Save, load, and wire-up logic for one field of `T`.
pub(crate) trait FieldCodec<T>: Send + Sync {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError>;

    /// Pass 1. By-value data is decoded; references are only recorded.
    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError>;

    /// Pass 2. References are resolved and assigned.
    fn wire(&self, _owner: &mut T, _wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        Ok(())
    }
}

/// Projection of a subclass onto its parent part.
trait BaseProjection<T>: Send + Sync {
    fn project<'a>(&self, owner: &'a T) -> &'a dyn Any;
}

struct ValueField<T, V> {
    name: &'static str,
    get: fn(&T) -> &V,
    get_mut: fn(&mut T) -> &mut V,
}

impl<T, V> FieldCodec<T> for ValueField<T, V>
where
    V: Serialize + DeserializeOwned,
{
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        out.encoder().write_value(self.name, (self.get)(owner))
    }

    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        *(self.get_mut)(owner) = input.decoder().read_value(self.name)?;
        Ok(())
    }
}

struct EmbeddedField<T, B> {
    name: &'static str,
    get: fn(&T) -> &B,
    get_mut: fn(&mut T) -> &mut B,
}

impl<T, B: Class> FieldCodec<T> for EmbeddedField<T, B> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        out.write_embedded((self.get)(owner))
    }

    fn load(&self, owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        input.read_embedded(self.name, (self.get_mut)(owner))
    }

    fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        wiring.wire_embedded((self.get_mut)(owner))
    }
}

impl<T, B: Class> BaseProjection<T> for EmbeddedField<T, B> {
    fn project<'a>(&self, owner: &'a T) -> &'a dyn Any {
        (self.get)(owner)
    }
}

struct OwnedField<T, C> {
    name: &'static str,
    get: fn(&T) -> &Owned<C>,
    get_mut: fn(&mut T) -> &mut Owned<C>,
}

impl<T, C: Class> FieldCodec<T> for OwnedField<T, C> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        let target = (self.get)(owner)
            .get()
            .map(|handle| ObjectHandle::from_handle(handle.clone()));
        out.write_ref(target, RefKind::Owning)
    }

    fn load(&self, _owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        input.read_ref(RefKind::Owning)
    }

    fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        *(self.get_mut)(owner) = wiring.next_owned(self.name)?;
        Ok(())
    }
}

struct SharedField<T, C> {
    name: &'static str,
    get: fn(&T) -> &Shared<C>,
    get_mut: fn(&mut T) -> &mut Shared<C>,
    resource: bool,
}

impl<T, C: Class> FieldCodec<T> for SharedField<T, C> {
    fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        out.write_shared(self.name, (self.get)(owner))
    }

    fn load(&self, _owner: &mut T, input: &mut RecordReader<'_, '_>) -> Result<(), DeserializeError> {
        input.read_ref(RefKind::Shared)
    }

    fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        *(self.get_mut)(owner) = wiring.next_shared(self.name, self.resource)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

struct FieldEntry<T> {
    info: FieldInfo,
    codec: Box<dyn FieldCodec<T>>,
}

/// Ordered field table of a class.
pub struct Fields<T> {
    entries: Vec<FieldEntry<T>>,
    base: Option<Box<dyn BaseProjection<T>>>,
    resource_key: Option<fn(&T) -> &str>,
}

impl<T: 'static> Fields<T> {
    /// An empty table, for manual registration.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            base: None,
            resource_key: None,
        }
    }

    /// The table a [`Class`] describes.
    pub fn of() -> Self
    where
        T: Class,
    {
        let mut fields = Self::new();
        T::describe(&mut fields);
        fields
    }

    /// Declared fields in wire order.
    pub fn infos(&self) -> impl Iterator<Item = &FieldInfo> + '_ {
        self.entries.iter().map(|e| &e.info)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(
        &mut self,
        name: &'static str,
        kind: FieldKind,
        codec: impl FieldCodec<T> + 'static,
    ) -> &mut Self {
        self.entries.push(FieldEntry {
            info: FieldInfo { name, kind },
            codec: Box::new(codec),
        });
        self
    }

    /// A plain value written as a `bincode` blob.
    pub fn value<V>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> &mut Self
    where
        V: Serialize + DeserializeOwned + 'static,
    {
        self.push(name, FieldKind::Value, ValueField { name, get, get_mut })
    }

    /// A nested record stored by value.
    pub fn embedded<B: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &B,
        get_mut: fn(&mut T) -> &mut B,
    ) -> &mut Self {
        self.push(name, FieldKind::Embedded, EmbeddedField { name, get, get_mut })
    }

    /// The parent-class part of a subclass.
    ///
    /// Stored like [`embedded`](Self::embedded), and also used by
    /// [`Registry::view`](crate::Registry::view) to read a subclass
    /// instance as its parent.
    pub fn base<P: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &P,
        get_mut: fn(&mut T) -> &mut P,
    ) -> &mut Self {
        self.base = Some(Box::new(EmbeddedField { name, get, get_mut }));
        self.embedded(name, get, get_mut)
    }

    /// An owning reference.
    pub fn owned<C: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Owned<C>,
        get_mut: fn(&mut T) -> &mut Owned<C>,
    ) -> &mut Self {
        self.push(name, FieldKind::OwningRef, OwnedField { name, get, get_mut })
    }

    /// A shared reference.
    pub fn shared<C: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Shared<C>,
        get_mut: fn(&mut T) -> &mut Shared<C>,
    ) -> &mut Self {
        let resource = false;
        self.push(
            name,
            FieldKind::SharedRef { resource },
            SharedField { name, get, get_mut, resource },
        )
    }

    /// A shared reference bound through the resource cache on load.
    pub fn resource<C: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Shared<C>,
        get_mut: fn(&mut T) -> &mut Shared<C>,
    ) -> &mut Self {
        let resource = true;
        self.push(
            name,
            FieldKind::SharedRef { resource },
            SharedField { name, get, get_mut, resource },
        )
    }

    /// A list of fixed-width plain values.
    pub fn value_list<V: bytemuck::Pod>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<V>,
        get_mut: fn(&mut T) -> &mut Vec<V>,
    ) -> &mut Self {
        self.push(
            name,
            FieldKind::Collection(CollectionKind::Values),
            ValueListField { get, get_mut },
        )
    }

    /// A list of records held by value.
    pub fn object_list<B: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<B>,
        get_mut: fn(&mut T) -> &mut Vec<B>,
    ) -> &mut Self {
        self.push(
            name,
            FieldKind::Collection(CollectionKind::Objects),
            ObjectListField { name, get, get_mut },
        )
    }

    /// A list of owning references.
    pub fn owned_list<C: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<Owned<C>>,
        get_mut: fn(&mut T) -> &mut Vec<Owned<C>>,
    ) -> &mut Self {
        self.push(
            name,
            FieldKind::Collection(CollectionKind::OwningRefs),
            OwnedListField { name, get, get_mut },
        )
    }

    /// A list of shared references.
    pub fn shared_list<C: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<Shared<C>>,
        get_mut: fn(&mut T) -> &mut Vec<Shared<C>>,
    ) -> &mut Self {
        let resource = false;
        self.push(
            name,
            FieldKind::Collection(CollectionKind::SharedRefs { resource }),
            SharedListField { name, get, get_mut, resource },
        )
    }

    /// A list of shared references bound through the resource cache.
    pub fn resource_list<C: Class>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<Shared<C>>,
        get_mut: fn(&mut T) -> &mut Vec<Shared<C>>,
    ) -> &mut Self {
        let resource = true;
        self.push(
            name,
            FieldKind::Collection(CollectionKind::SharedRefs { resource }),
            SharedListField { name, get, get_mut, resource },
        )
    }

    /// Declares the resource identity of instances of this class.
    ///
    /// Resource-backed references to an instance with a non-empty key are
    /// resolved through the resource cache on load.
    pub fn resource_key(&mut self, key: fn(&T) -> &str) -> &mut Self {
        self.resource_key = Some(key);
        self
    }

    // --- driven by the serializer ---

    pub(crate) fn save(&self, owner: &T, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        for entry in &self.entries {
            entry.codec.save(owner, out)?;
        }
        Ok(())
    }

    pub(crate) fn load(
        &self,
        owner: &mut T,
        input: &mut RecordReader<'_, '_>,
    ) -> Result<(), DeserializeError> {
        for entry in &self.entries {
            entry.codec.load(owner, input)?;
        }
        Ok(())
    }

    pub(crate) fn wire(&self, owner: &mut T, wiring: &mut Wiring<'_>) -> Result<(), DeserializeError> {
        for entry in &self.entries {
            entry.codec.wire(owner, wiring)?;
        }
        Ok(())
    }

    pub(crate) fn resource_key_of(&self, owner: &T) -> Option<String> {
        let key = (self.resource_key?)(owner);
        (!key.is_empty()).then(|| key.to_owned())
    }

    pub(crate) fn project_base<'a>(&self, owner: &'a T) -> Option<&'a dyn Any> {
        self.base.as_ref().map(|base| base.project(owner))
    }
}

impl<T: 'static> Default for Fields<T> {
    fn default() -> Self {
        Self::new()
    }
}
