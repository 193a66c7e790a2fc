//! Class registry.
//!
//! Classes are registered on a [`RegistryBuilder`] during start-up, parents
//! before children, and then frozen into an immutable [`Registry`]. The
//! registry answers tag lookups for the serializer and implements checked
//! downcasts ([`Registry::safe_cast`], [`Registry::view`]) over the class
//! hierarchy.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::class::{Class, ClassDescriptor};
use crate::error::{RegistrationError, UnknownTag};
use crate::handle::ObjectHandle;
use crate::tag::TypeTag;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Tag and name indices over an ordered list of descriptors.
#[derive(Default)]
struct ClassTable {
    classes: Vec<ClassDescriptor>,
    by_tag: HashMap<TypeTag, usize>,
    by_name: HashMap<&'static str, TypeTag>,
}

impl ClassTable {
    fn get(&self, tag: TypeTag) -> Option<&ClassDescriptor> {
        self.by_tag.get(&tag).map(|&index| &self.classes[index])
    }
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Mutable registry under construction.
#[derive(Default)]
pub struct RegistryBuilder {
    table: ClassTable,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class descriptor.
    ///
    /// Registering a descriptor identical to one already present is a no-op.
    /// The parent, if any, must already be registered.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Result<&mut Self, RegistrationError> {
        let tag = descriptor.tag();
        let name = descriptor.name();

        if let Some(existing) = self.table.get(tag) {
            if existing.same_class_as(&descriptor) {
                log::debug!("class '{name}' ({tag}) registered again, ignoring");
                return Ok(self);
            }
            return Err(RegistrationError::DuplicateTag {
                tag,
                existing: existing.name(),
                name,
            });
        }
        if let Some(&existing) = self.table.by_name.get(name) {
            return Err(RegistrationError::DuplicateName { name, existing });
        }
        if let Some(parent) = descriptor.parent() {
            if !self.table.by_tag.contains_key(&parent) {
                return Err(RegistrationError::UnknownParent { name, parent });
            }
        }

        self.table.by_tag.insert(tag, self.table.classes.len());
        self.table.by_name.insert(name, tag);
        self.table.classes.push(descriptor);
        Ok(self)
    }

    /// Adds the descriptor of a [`Class`].
    pub fn register_class<T: Class>(&mut self) -> Result<&mut Self, RegistrationError> {
        self.register(ClassDescriptor::of::<T>())
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.table.by_tag.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.table.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.classes.is_empty()
    }

    /// Freezes the registry.
    pub fn build(self) -> Registry {
        Registry { table: self.table }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable tag → class mapping.
///
/// `Send + Sync`; any number of threads may query it concurrently.
pub struct Registry {
    table: ClassTable,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Publishes this registry process-wide.
    ///
    /// Only the first call succeeds.
    pub fn install(self) -> Result<&'static Registry, RegistrationError> {
        let mut installed = false;
        let registry = GLOBAL.get_or_init(|| {
            installed = true;
            self
        });
        if !installed {
            return Err(RegistrationError::AlreadyInstalled);
        }
        log::info!("class registry installed with {} classes", registry.len());
        Ok(registry)
    }

    /// The registry published with [`install`](Self::install), if any.
    pub fn global() -> Option<&'static Registry> {
        GLOBAL.get()
    }

    pub fn lookup(&self, tag: TypeTag) -> Result<&ClassDescriptor, UnknownTag> {
        self.table.get(tag).ok_or(UnknownTag(tag))
    }

    pub fn lookup_name(&self, name: &str) -> Option<&ClassDescriptor> {
        let tag = *self.table.by_name.get(name)?;
        self.table.get(tag)
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.table.by_tag.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.table.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.classes.is_empty()
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassDescriptor> + '_ {
        self.table.classes.iter()
    }

    pub fn parent_of(&self, tag: TypeTag) -> Option<TypeTag> {
        self.table.get(tag)?.parent()
    }

    /// Returns `true` if `tag` is `ancestor` or derives from it.
    ///
    /// Unregistered tags derive from nothing.
    pub fn is_subclass_of(&self, tag: TypeTag, ancestor: TypeTag) -> bool {
        let mut cursor = self.table.get(tag);
        while let Some(class) = cursor {
            if class.tag() == ancestor {
                return true;
            }
            cursor = class.parent().and_then(|parent| self.table.get(parent));
        }
        false
    }

    /// Checked downcast.
    ///
    /// Returns the object viewed at `target` if its runtime class is `target`
    /// or derives from it, `None` otherwise (including for unregistered
    /// classes).
    pub fn safe_cast(&self, target: TypeTag, object: &ObjectHandle) -> Option<ObjectHandle> {
        self.is_subclass_of(object.tag(), target)
            .then(|| object.clone().viewed_as(target))
    }

    /// Read-locks `object` and passes its `V` part to `f`.
    ///
    /// `V` may be the object's own class or any ancestor that subclasses
    /// expose through [`Fields::base`](crate::Fields::base). Returns `None`
    /// when the object is not a `V`.
    pub fn view<V: Class, R>(&self, object: &ObjectHandle, f: impl FnOnce(&V) -> R) -> Option<R> {
        if !self.is_subclass_of(object.tag(), V::TAG) {
            return None;
        }
        let descriptor = self.table.get(object.tag())?;
        let mut f = Some(f);
        let mut out = None;
        descriptor.ops().read_object(object, &mut |value: &dyn Any| {
            let part = self
                .project(object.tag(), value, V::TAG)
                .and_then(|part| part.downcast_ref::<V>());
            if let (Some(part), Some(f)) = (part, f.take()) {
                out = Some(f(part));
            }
        });
        out
    }

    /// Walks base parts from class `tag` up to class `target`.
    fn project<'a>(&self, mut tag: TypeTag, mut value: &'a dyn Any, target: TypeTag) -> Option<&'a dyn Any> {
        while tag != target {
            let class = self.table.get(tag)?;
            value = class.ops().upcast(value)?;
            tag = class.parent()?;
        }
        Some(value)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.table.classes.iter().map(|c| (c.tag(), c.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Fields;

    #[derive(Default)]
    struct Shape {
        id: u32,
    }

    impl Class for Shape {
        const TAG: TypeTag = TypeTag::from_fourcc(b"SHAP");
        const NAME: &'static str = "Shape";

        fn describe(fields: &mut Fields<Self>) {
            fields.value("id", |s| &s.id, |s| &mut s.id);
        }
    }

    #[derive(Default)]
    struct Polygon {
        base: Shape,
        sides: u32,
    }

    impl Class for Polygon {
        const TAG: TypeTag = TypeTag::from_fourcc(b"POLY");
        const NAME: &'static str = "Polygon";
        const PARENT: Option<TypeTag> = Some(Shape::TAG);

        fn describe(fields: &mut Fields<Self>) {
            fields
                .base("base", |p| &p.base, |p| &mut p.base)
                .value("sides", |p| &p.sides, |p| &mut p.sides);
        }
    }

    #[derive(Default)]
    struct Square {
        base: Polygon,
    }

    impl Class for Square {
        const TAG: TypeTag = TypeTag::from_fourcc(b"SQUA");
        const NAME: &'static str = "Square";
        const PARENT: Option<TypeTag> = Some(Polygon::TAG);

        fn describe(fields: &mut Fields<Self>) {
            fields.base("base", |s| &s.base, |s| &mut s.base);
        }
    }

    #[derive(Default)]
    struct Circle;

    impl Class for Circle {
        const TAG: TypeTag = TypeTag::from_fourcc(b"CIRC");
        const NAME: &'static str = "Circle";
        const PARENT: Option<TypeTag> = Some(Shape::TAG);

        fn describe(_fields: &mut Fields<Self>) {}
    }

    fn shapes() -> Registry {
        let mut builder = Registry::builder();
        builder
            .register_class::<Shape>()
            .unwrap()
            .register_class::<Polygon>()
            .unwrap()
            .register_class::<Square>()
            .unwrap()
            .register_class::<Circle>()
            .unwrap();
        builder.build()
    }

    #[test]
    fn lookup_by_tag_and_name() {
        let registry = shapes();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.lookup(Polygon::TAG).unwrap().name(), "Polygon");
        assert_eq!(registry.lookup_name("Square").unwrap().tag(), Square::TAG);
        assert_eq!(
            registry.lookup(TypeTag::from_fourcc(b"NOPE")).unwrap_err(),
            UnknownTag(TypeTag::from_fourcc(b"NOPE"))
        );
        assert_eq!(registry.parent_of(Square::TAG), Some(Polygon::TAG));
        assert_eq!(registry.parent_of(Shape::TAG), None);
    }

    #[test]
    fn subclass_relation_follows_parent_chain() {
        let registry = shapes();
        assert!(registry.is_subclass_of(Square::TAG, Square::TAG));
        assert!(registry.is_subclass_of(Square::TAG, Polygon::TAG));
        assert!(registry.is_subclass_of(Square::TAG, Shape::TAG));
        assert!(!registry.is_subclass_of(Polygon::TAG, Square::TAG));
        assert!(!registry.is_subclass_of(Circle::TAG, Polygon::TAG));
        assert!(!registry.is_subclass_of(TypeTag::from_fourcc(b"NOPE"), Shape::TAG));
    }

    #[test]
    fn safe_cast_sets_the_view() {
        let registry = shapes();
        let square = ObjectHandle::new(Square::default());

        let as_shape = registry.safe_cast(Shape::TAG, &square).unwrap();
        assert_eq!(as_shape.view_tag(), Shape::TAG);
        assert_eq!(as_shape.tag(), Square::TAG);
        assert!(as_shape.ptr_eq(&square));

        assert!(registry.safe_cast(Circle::TAG, &square).is_none());
        let polygon = ObjectHandle::new(Polygon::default());
        assert!(registry.safe_cast(Square::TAG, &polygon).is_none());
    }

    #[test]
    fn view_projects_through_base_parts() {
        let registry = shapes();
        let mut square = Square::default();
        square.base.base.id = 9;
        square.base.sides = 4;
        let square = ObjectHandle::new(square);

        assert_eq!(registry.view::<Shape, _>(&square, |s| s.id), Some(9));
        assert_eq!(registry.view::<Polygon, _>(&square, |p| p.sides), Some(4));
        assert_eq!(registry.view::<Circle, _>(&square, |_| ()), None);
    }

    #[test]
    fn identical_registration_is_a_no_op() {
        let mut builder = RegistryBuilder::new();
        builder.register_class::<Shape>().unwrap();
        builder.register_class::<Shape>().unwrap();
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn conflicting_registrations_are_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register_class::<Shape>().unwrap();

        let clash = ClassDescriptor::new(Shape::TAG, "Other", None, || 0u8, Fields::new());
        assert!(matches!(
            builder.register(clash),
            Err(RegistrationError::DuplicateTag { existing: "Shape", .. })
        ));

        let renamed = ClassDescriptor::new(
            TypeTag::from_fourcc(b"SHP2"),
            "Shape",
            None,
            || 0u8,
            Fields::new(),
        );
        assert!(matches!(
            builder.register(renamed),
            Err(RegistrationError::DuplicateName { name: "Shape", .. })
        ));

        assert!(matches!(
            builder.register_class::<Square>(),
            Err(RegistrationError::UnknownParent { name: "Square", .. })
        ));
    }
}
