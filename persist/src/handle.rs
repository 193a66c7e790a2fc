//! Live object handles and the two reference kinds.
//!
//! Every persistent object lives behind a [`Handle<T>`]
//! (`Arc<RwLock<T>>`). Fields refer to other objects through:
//!
//! - [`Owned<T>`]: the exclusive owner. Holds a strong handle and is not
//!   `Clone`; dropping it frees the referent.
//! - [`Shared<T>`]: a non-owning view. Holds a weak handle; the referent is
//!   kept alive by its owner, the loaded graph, or the resource cache.
//!
//! By-value (embedded) fields need no wrapper.
//!
//! [`ObjectHandle`] is the type-erased form used by the registry and the
//! serializer. It carries the object's runtime [`TypeTag`], so class identity
//! never depends on compiler type information.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::class::Class;
use crate::tag::TypeTag;

/// Shared, lockable storage for one persistent object.
pub type Handle<T> = Arc<RwLock<T>>;

// ---------------------------------------------------------------------------
// ObjectHandle
// ---------------------------------------------------------------------------

/// Type-erased handle to a persistent object.
///
/// Cloning is cheap and yields another handle to the same object.
#[derive(Clone)]
pub struct ObjectHandle {
    tag: TypeTag,
    view: TypeTag,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    /// Moves `value` into a new handle tagged with its class tag.
    pub fn new<T: Class>(value: T) -> Self {
        Self::from_handle(Arc::new(RwLock::new(value)))
    }

    /// Erases an existing typed handle.
    pub fn from_handle<T: Class>(handle: Handle<T>) -> Self {
        Self::from_tagged(T::TAG, handle)
    }

    /// Erases a handle under an explicit tag.
    ///
    /// Used for classes registered by hand through
    /// [`ClassDescriptor::new`](crate::ClassDescriptor::new).
    pub fn from_tagged<T: Send + Sync + 'static>(tag: TypeTag, handle: Handle<T>) -> Self {
        Self {
            tag,
            view: tag,
            inner: handle,
        }
    }

    /// The object's most-derived class tag.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The tag this handle is currently viewed at.
    ///
    /// Equal to [`tag`](Self::tag) unless the handle came out of
    /// [`Registry::safe_cast`](crate::Registry::safe_cast).
    pub fn view_tag(&self) -> TypeTag {
        self.view
    }

    /// Recovers the typed handle when the object is exactly a `T`.
    pub fn downcast<T: Class>(&self) -> Option<Handle<T>> {
        if self.tag != T::TAG {
            return None;
        }
        self.downcast_untagged()
    }

    pub(crate) fn downcast_untagged<T: Send + Sync + 'static>(&self) -> Option<Handle<T>> {
        self.inner.clone().downcast::<RwLock<T>>().ok()
    }

    pub(crate) fn inner(&self) -> &(dyn Any + Send + Sync) {
        self.inner.as_ref()
    }

    pub(crate) fn viewed_as(mut self, view: TypeTag) -> Self {
        self.view = view;
        self
    }

    /// Address of the object, used as its identity.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Returns `true` if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        self.identity() == other.identity()
    }

    /// Returns `true` if this handle refers to the object behind `handle`.
    pub fn is<T: Send + Sync + 'static>(&self, handle: &Handle<T>) -> bool {
        self.identity() == Arc::as_ptr(handle) as *const () as usize
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("tag", &self.tag)
            .field("view", &self.view)
            .field("identity", &format_args!("{:#x}", self.identity()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Owned
// ---------------------------------------------------------------------------

/// Owning reference: the single owner responsible for the referent.
pub struct Owned<T>(Option<Handle<T>>);

impl<T> Owned<T> {
    /// Creates an owner for a new object.
    pub fn new(value: T) -> Self {
        Self(Some(Arc::new(RwLock::new(value))))
    }

    /// Takes ownership of an existing handle.
    pub fn from_handle(handle: Handle<T>) -> Self {
        Self(Some(handle))
    }

    /// An empty (null) owning reference.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    /// Borrows the owned handle.
    pub fn get(&self) -> Option<&Handle<T>> {
        self.0.as_ref()
    }

    /// Releases ownership, leaving the reference empty.
    pub fn take(&mut self) -> Option<Handle<T>> {
        self.0.take()
    }

    /// A non-owning view of the referent.
    pub fn share(&self) -> Shared<T> {
        match &self.0 {
            Some(handle) => Shared::to(handle),
            None => Shared::none(),
        }
    }
}

impl<T> Default for Owned<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(handle) => write!(f, "Owned({:p})", Arc::as_ptr(handle)),
            None => write!(f, "Owned(null)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Shared reference: one of possibly many non-owning referrers.
pub struct Shared<T>(Option<Weak<RwLock<T>>>);

impl<T> Shared<T> {
    /// Creates a view of `handle` without taking part in its lifetime.
    pub fn to(handle: &Handle<T>) -> Self {
        Self(Some(Arc::downgrade(handle)))
    }

    /// An empty (null) shared reference.
    pub fn none() -> Self {
        Self(None)
    }

    /// Returns `true` for the null reference (not for a dangling one).
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Returns `true` if the reference was set but its referent is gone.
    pub fn is_dangling(&self) -> bool {
        self.0.as_ref().is_some_and(|weak| weak.strong_count() == 0)
    }

    /// Returns the referent if it is still alive.
    pub fn upgrade(&self) -> Option<Handle<T>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }

    /// Returns `true` if this reference points at the object behind `handle`.
    pub fn points_to(&self, handle: &Handle<T>) -> bool {
        self.0
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(handle)))
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(weak) if weak.strong_count() > 0 => write!(f, "Shared({:p})", weak.as_ptr()),
            Some(_) => write!(f, "Shared(dangling)"),
            None => write!(f, "Shared(null)"),
        }
    }
}
