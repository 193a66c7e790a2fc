//! Persistent classes and their descriptors.
//!
//! The [`Class`] trait is the object base capability: a class names its own
//! [`TypeTag`], its parent, and describes its fields in wire order. A
//! [`ClassDescriptor`] is the registered, type-erased form of a class.
//!
//! # Declaring a class
//!
//! ```ignore
//! #[derive(Default)]
//! struct Animation {
//!     base: Asset,
//!     duration: f32,
//!     skeleton: Shared<Skeleton>,
//!     tracks: Vec<Owned<Track>>,
//! }
//!
//! impl Class for Animation {
//!     const TAG: TypeTag = TypeTag::from_fourcc(b"ANIM");
//!     const NAME: &'static str = "Animation";
//!     const PARENT: Option<TypeTag> = Some(Asset::TAG);
//!
//!     fn describe(fields: &mut Fields<Self>) {
//!         fields
//!             .base("base", |a| &a.base, |a| &mut a.base)
//!             .value("duration", |a| &a.duration, |a| &mut a.duration)
//!             .resource("skeleton", |a| &a.skeleton, |a| &mut a.skeleton)
//!             .owned_list("tracks", |a| &a.tracks, |a| &mut a.tracks);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use parking_lot::RwLock;

use crate::error::{DeserializeError, SerializeError};
use crate::fields::{FieldInfo, Fields};
use crate::handle::ObjectHandle;
use crate::serializer::load::{RecordReader, Wiring};
use crate::serializer::save::SaveSession;
use crate::tag::TypeTag;

/// A persistent class.
///
/// `Default` builds the bare instance that loading starts from; everything
/// else comes out of [`describe`](Self::describe).
pub trait Class: Default + Send + Sync + 'static {
    /// Stable wire identifier. Must be unique across all registered classes.
    const TAG: TypeTag;

    /// Human-readable class name (e.g. `"Mesh"`).
    const NAME: &'static str;

    /// Tag of the parent class, if any.
    ///
    /// Subclasses hold their parent part as a field declared with
    /// [`Fields::base`].
    const PARENT: Option<TypeTag> = None;

    /// Declares the persistent fields in wire order.
    fn describe(fields: &mut Fields<Self>);

    /// Returns the class tag of this object.
    fn type_tag(&self) -> TypeTag {
        Self::TAG
    }
}

// ---------------------------------------------------------------------------
// ClassDescriptor
// ---------------------------------------------------------------------------

/// Registered description of one class.
///
/// Immutable once built. Created with [`ClassDescriptor::of`] for types that
/// implement [`Class`], or with [`ClassDescriptor::new`] for manual
/// registration.
pub struct ClassDescriptor {
    tag: TypeTag,
    name: &'static str,
    parent: Option<TypeTag>,
    fields: Vec<FieldInfo>,
    ops: Box<dyn ErasedClass>,
}

impl ClassDescriptor {
    /// Builds a descriptor from its parts.
    ///
    /// `factory` constructs the bare instance that a record is decoded into;
    /// `fields` is the ordered field table.
    pub fn new<T: Send + Sync + 'static>(
        tag: TypeTag,
        name: &'static str,
        parent: Option<TypeTag>,
        factory: fn() -> T,
        fields: Fields<T>,
    ) -> Self {
        Self {
            tag,
            name,
            parent,
            fields: fields.infos().copied().collect(),
            ops: Box::new(ClassOps {
                tag,
                name,
                factory,
                fields,
            }),
        }
    }

    /// Builds the descriptor of a [`Class`].
    pub fn of<T: Class>() -> Self {
        Self::new(T::TAG, T::NAME, T::PARENT, T::default, Fields::<T>::of())
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<TypeTag> {
        self.parent
    }

    /// The field table in wire order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub(crate) fn ops(&self) -> &dyn ErasedClass {
        self.ops.as_ref()
    }

    /// Two descriptors are the same class if every declared property matches.
    pub(crate) fn same_class_as(&self, other: &ClassDescriptor) -> bool {
        self.tag == other.tag
            && self.name == other.name
            && self.parent == other.parent
            && self.fields == other.fields
            && self.ops.rust_type() == other.ops.rust_type()
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("fields", &self.fields)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Type-erased class operations
// ---------------------------------------------------------------------------

/// Operations the serializer performs on objects of a registered class
/// without knowing its Rust type.
///
/// `*_value` methods work on a by-value instance (an embedded record);
/// `*_object` methods lock a live object first.
pub(crate) trait ErasedClass: Send + Sync {
    /// Identity of the Rust type behind the class, used only to tell
    /// identical re-registration apart from a conflicting one.
    fn rust_type(&self) -> TypeId;

    fn save_value(&self, value: &dyn Any, out: &mut SaveSession<'_>) -> Result<(), SerializeError>;

    fn load_value(
        &self,
        value: &mut dyn Any,
        input: &mut RecordReader<'_, '_>,
    ) -> Result<(), DeserializeError>;

    fn wire_value(&self, value: &mut dyn Any, wiring: &mut Wiring<'_>)
        -> Result<(), DeserializeError>;

    fn save_object(
        &self,
        object: &ObjectHandle,
        out: &mut SaveSession<'_>,
    ) -> Result<(), SerializeError>;

    /// Pass 1: builds a bare instance and decodes its by-value fields.
    ///
    /// Returns the new object and its resource key, if it has one.
    fn construct(
        &self,
        input: &mut RecordReader<'_, '_>,
    ) -> Result<(ObjectHandle, Option<String>), DeserializeError>;

    /// Pass 2: assigns every reference field of a constructed object.
    fn wire_object(
        &self,
        object: &ObjectHandle,
        wiring: &mut Wiring<'_>,
    ) -> Result<(), DeserializeError>;

    /// Read-locks the object and hands it to `visit`. Returns `false` if the
    /// handle does not hold this class.
    fn read_object(&self, object: &ObjectHandle, visit: &mut dyn FnMut(&dyn Any)) -> bool;

    /// Projects an instance onto its parent part.
    fn upcast<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any>;
}

struct ClassOps<T> {
    tag: TypeTag,
    name: &'static str,
    factory: fn() -> T,
    fields: Fields<T>,
}

impl<T> ClassOps<T> {
    fn mismatch_on_load(&self, found: TypeTag) -> DeserializeError {
        DeserializeError::TypeMismatch {
            field: self.name,
            expected: self.name,
            found,
        }
    }
}

impl<T: Send + Sync + 'static> ErasedClass for ClassOps<T> {
    fn rust_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn save_value(&self, value: &dyn Any, out: &mut SaveSession<'_>) -> Result<(), SerializeError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or(SerializeError::TypeMismatch {
                tag: self.tag,
                expected: self.name,
            })?;
        self.fields.save(value, out)
    }

    fn load_value(
        &self,
        value: &mut dyn Any,
        input: &mut RecordReader<'_, '_>,
    ) -> Result<(), DeserializeError> {
        let value = value
            .downcast_mut::<T>()
            .ok_or_else(|| self.mismatch_on_load(self.tag))?;
        self.fields.load(value, input)
    }

    fn wire_value(
        &self,
        value: &mut dyn Any,
        wiring: &mut Wiring<'_>,
    ) -> Result<(), DeserializeError> {
        let value = value
            .downcast_mut::<T>()
            .ok_or_else(|| self.mismatch_on_load(self.tag))?;
        self.fields.wire(value, wiring)
    }

    fn save_object(
        &self,
        object: &ObjectHandle,
        out: &mut SaveSession<'_>,
    ) -> Result<(), SerializeError> {
        let lock = object
            .inner()
            .downcast_ref::<RwLock<T>>()
            .ok_or(SerializeError::TypeMismatch {
                tag: object.tag(),
                expected: self.name,
            })?;
        let guard = lock.read();
        self.fields.save(&guard, out)
    }

    fn construct(
        &self,
        input: &mut RecordReader<'_, '_>,
    ) -> Result<(ObjectHandle, Option<String>), DeserializeError> {
        let mut value = (self.factory)();
        self.fields.load(&mut value, input)?;
        let key = self.fields.resource_key_of(&value);
        let handle = std::sync::Arc::new(RwLock::new(value));
        Ok((ObjectHandle::from_tagged(self.tag, handle), key))
    }

    fn wire_object(
        &self,
        object: &ObjectHandle,
        wiring: &mut Wiring<'_>,
    ) -> Result<(), DeserializeError> {
        let lock = object
            .inner()
            .downcast_ref::<RwLock<T>>()
            .ok_or_else(|| self.mismatch_on_load(object.tag()))?;
        let mut guard = lock.write();
        self.fields.wire(&mut guard, wiring)
    }

    fn read_object(&self, object: &ObjectHandle, visit: &mut dyn FnMut(&dyn Any)) -> bool {
        match object.inner().downcast_ref::<RwLock<T>>() {
            Some(lock) => {
                let guard = lock.read();
                visit(&*guard);
                true
            }
            None => false,
        }
    }

    fn upcast<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        let value = value.downcast_ref::<T>()?;
        self.fields.project_base(value)
    }
}
