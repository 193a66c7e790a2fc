use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use redlilium_persist::{
    load, save, Class, ClassDescriptor, DanglingShared, DeserializeError, Deserializer, Fields,
    Handle, LoadConfig, MemoryResourceCache, ObjectHandle, Owned, OwnershipError,
    PersistConfig, Registry, RegistrationError, ResourceCache, SaveConfig, SerializeError,
    Serializer, Shared, TypeTag, NULL_SLOT,
};

// ---------------------------------------------------------------------------
// Fixture classes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct B {
    data: i32,
}

impl Class for B {
    const TAG: TypeTag = TypeTag::from_fourcc(b"TSTB");
    const NAME: &'static str = "B";

    fn describe(fields: &mut Fields<Self>) {
        fields.value("data", |b| &b.data, |b| &mut b.data);
    }
}

#[derive(Default)]
struct C {
    data: i32,
}

impl Class for C {
    const TAG: TypeTag = TypeTag::from_fourcc(b"TSTC");
    const NAME: &'static str = "C";

    fn describe(fields: &mut Fields<Self>) {
        fields.value("data", |c| &c.data, |c| &mut c.data);
    }
}

#[derive(Default)]
struct A {
    data: i32,
    b: B,
    c: Owned<C>,
}

impl Class for A {
    const TAG: TypeTag = TypeTag::from_fourcc(b"TSTA");
    const NAME: &'static str = "A";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("data", |a| &a.data, |a| &mut a.data)
            .embedded("b", |a| &a.b, |a| &mut a.b)
            .owned("c", |a| &a.c, |a| &mut a.c);
    }
}

#[derive(Default)]
struct Node {
    name: String,
    child: Owned<Node>,
    peer: Shared<Node>,
}

impl Class for Node {
    const TAG: TypeTag = TypeTag::from_fourcc(b"NODE");
    const NAME: &'static str = "Node";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("name", |n| &n.name, |n| &mut n.name)
            .owned("child", |n| &n.child, |n| &mut n.child)
            .shared("peer", |n| &n.peer, |n| &mut n.peer);
    }
}

#[derive(Default)]
struct Item {
    value: u32,
}

impl Class for Item {
    const TAG: TypeTag = TypeTag::from_fourcc(b"ITEM");
    const NAME: &'static str = "Item";

    fn describe(fields: &mut Fields<Self>) {
        fields.value("value", |i| &i.value, |i| &mut i.value);
    }
}

#[derive(Default)]
struct Group {
    items: Vec<Owned<Item>>,
    favorites: Vec<Shared<Item>>,
    pick: Shared<Item>,
}

impl Class for Group {
    const TAG: TypeTag = TypeTag::from_fourcc(b"GRUP");
    const NAME: &'static str = "Group";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .owned_list("items", |g| &g.items, |g| &mut g.items)
            .shared_list("favorites", |g| &g.favorites, |g| &mut g.favorites)
            .shared("pick", |g| &g.pick, |g| &mut g.pick);
    }
}

#[derive(Default)]
struct Polyline {
    points: Vec<[f32; 3]>,
    segments: Vec<B>,
    label: Option<String>,
}

impl Class for Polyline {
    const TAG: TypeTag = TypeTag::from_fourcc(b"PLIN");
    const NAME: &'static str = "Polyline";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value_list("points", |p| &p.points, |p| &mut p.points)
            .object_list("segments", |p| &p.segments, |p| &mut p.segments)
            .value("label", |p| &p.label, |p| &mut p.label);
    }
}

#[derive(Default)]
struct Base {
    id: u32,
}

impl Class for Base {
    const TAG: TypeTag = TypeTag::from_fourcc(b"BASE");
    const NAME: &'static str = "Base";

    fn describe(fields: &mut Fields<Self>) {
        fields.value("id", |b| &b.id, |b| &mut b.id);
    }
}

#[derive(Default)]
struct Mid {
    base: Base,
    speed: f32,
}

impl Class for Mid {
    const TAG: TypeTag = TypeTag::from_fourcc(b"MIDL");
    const NAME: &'static str = "Mid";
    const PARENT: Option<TypeTag> = Some(Base::TAG);

    fn describe(fields: &mut Fields<Self>) {
        fields
            .base("base", |m| &m.base, |m| &mut m.base)
            .value("speed", |m| &m.speed, |m| &mut m.speed);
    }
}

#[derive(Default)]
struct Leaf {
    base: Mid,
    color: [u8; 4],
}

impl Class for Leaf {
    const TAG: TypeTag = TypeTag::from_fourcc(b"LEAF");
    const NAME: &'static str = "Leaf";
    const PARENT: Option<TypeTag> = Some(Mid::TAG);

    fn describe(fields: &mut Fields<Self>) {
        fields
            .base("base", |l| &l.base, |l| &mut l.base)
            .value("color", |l| &l.color, |l| &mut l.color);
    }
}

#[derive(Default)]
struct Unrelated;

impl Class for Unrelated {
    const TAG: TypeTag = TypeTag::from_fourcc(b"UNRL");
    const NAME: &'static str = "Unrelated";

    fn describe(_fields: &mut Fields<Self>) {}
}

#[derive(Default)]
struct Texture {
    name: String,
    pixels: Vec<u32>,
}

impl Class for Texture {
    const TAG: TypeTag = TypeTag::from_fourcc(b"TEXR");
    const NAME: &'static str = "Texture";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("name", |t| &t.name, |t| &mut t.name)
            .value_list("pixels", |t| &t.pixels, |t| &mut t.pixels)
            .resource_key(|t| t.name.as_str());
    }
}

#[derive(Default)]
struct Material {
    albedo: Shared<Texture>,
    detail: Shared<Texture>,
}

impl Class for Material {
    const TAG: TypeTag = TypeTag::from_fourcc(b"MATL");
    const NAME: &'static str = "Material";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .resource("albedo", |m| &m.albedo, |m| &mut m.albedo)
            .resource("detail", |m| &m.detail, |m| &mut m.detail);
    }
}

#[derive(Default)]
struct Library {
    materials: Vec<Owned<Material>>,
    textures: Vec<Shared<Texture>>,
}

impl Class for Library {
    const TAG: TypeTag = TypeTag::from_fourcc(b"LIBR");
    const NAME: &'static str = "Library";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .owned_list("materials", |l| &l.materials, |l| &mut l.materials)
            .resource_list("textures", |l| &l.textures, |l| &mut l.textures);
    }
}

fn registry() -> Registry {
    let mut builder = Registry::builder();
    builder
        .register_class::<B>()
        .unwrap()
        .register_class::<C>()
        .unwrap()
        .register_class::<A>()
        .unwrap()
        .register_class::<Node>()
        .unwrap()
        .register_class::<Item>()
        .unwrap()
        .register_class::<Group>()
        .unwrap()
        .register_class::<Polyline>()
        .unwrap()
        .register_class::<Base>()
        .unwrap()
        .register_class::<Mid>()
        .unwrap()
        .register_class::<Leaf>()
        .unwrap()
        .register_class::<Unrelated>()
        .unwrap()
        .register_class::<Texture>()
        .unwrap()
        .register_class::<Material>()
        .unwrap()
        .register_class::<Library>()
        .unwrap();
    builder.build()
}

fn canonical_a() -> ObjectHandle {
    ObjectHandle::new(A {
        data: 1,
        b: B { data: 2 },
        c: Owned::new(C { data: 3 }),
    })
}

fn handle<T>(value: T) -> Handle<T> {
    Arc::new(RwLock::new(value))
}

fn put_u32(bytes: &mut Vec<u8>, value: u32) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn canonical_fixture_round_trip() {
    let registry = registry();
    let a = canonical_a();
    let original_c = a.downcast::<A>().unwrap().read().c.get().unwrap().clone();

    let bytes = save(&registry, &a).unwrap();
    // A: tag, data, B tag, b.data, slot of c. C: tag, data.
    assert_eq!(bytes.len(), 28);
    assert_eq!(&bytes[16..20], &1u32.to_le_bytes());

    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.root_tag(), A::TAG);
    assert_eq!(graph.record_tags(), &[A::TAG, C::TAG]);

    let a2 = graph.root().downcast::<A>().unwrap();
    let a2 = a2.read();
    assert_eq!(a2.data, 1);
    assert_eq!(a2.b.data, 2);
    let c2 = a2.c.get().unwrap();
    assert_eq!(c2.read().data, 3);
    assert!(!Arc::ptr_eq(c2, &original_c));
}

#[test]
fn owned_referent_lives_only_through_its_owner() {
    let registry = registry();
    let bytes = save(&registry, &canonical_a()).unwrap();
    let graph = load(&registry, &bytes).unwrap();

    assert_eq!(graph.retained().len(), 1);
    let a2 = graph.root().downcast::<A>().unwrap();
    let c2 = a2.read().c.get().unwrap().clone();
    assert_eq!(Arc::strong_count(&c2), 2);

    let weak = Arc::downgrade(&c2);
    drop(c2);
    a2.write().c = Owned::none();
    assert!(weak.upgrade().is_none());
}

#[test]
fn owning_then_shared_cycle_resolves_to_same_identity() {
    let registry = registry();
    let a = handle(Node {
        name: "a".into(),
        ..Default::default()
    });
    let b = Owned::new(Node {
        name: "b".into(),
        peer: Shared::to(&a),
        ..Default::default()
    });
    a.write().child = b;

    let bytes = save(&registry, &ObjectHandle::from_handle(a.clone())).unwrap();
    let graph = load(&registry, &bytes).unwrap();

    let a2 = graph.root().downcast::<Node>().unwrap();
    let b2 = a2.read().child.get().unwrap().clone();
    assert_eq!(a2.read().name, "a");
    assert_eq!(b2.read().name, "b");
    assert!(b2.read().peer.points_to(&a2));
    assert!(!graph.root().is(&a));
}

#[test]
fn shared_only_cycle_is_kept_alive_by_the_graph() {
    let registry = registry();
    let a = handle(Node {
        name: "a".into(),
        ..Default::default()
    });
    let b = handle(Node {
        name: "b".into(),
        peer: Shared::to(&a),
        ..Default::default()
    });
    a.write().peer = Shared::to(&b);

    let bytes = save(&registry, &ObjectHandle::from_handle(a)).unwrap();
    drop(b);
    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.record_count(), 2);
    assert_eq!(graph.retained().len(), 2);

    let a2 = graph.root().downcast::<Node>().unwrap();
    let b2 = a2.read().peer.upgrade().unwrap();
    assert_eq!(b2.read().name, "b");
    assert!(b2.read().peer.points_to(&a2));
}

#[test]
fn self_reference_round_trips() {
    let registry = registry();
    let a = handle(Node {
        name: "loop".into(),
        ..Default::default()
    });
    a.write().peer = Shared::to(&a);

    let bytes = save(&registry, &ObjectHandle::from_handle(a)).unwrap();
    let graph = load(&registry, &bytes).unwrap();
    let a2 = graph.root().downcast::<Node>().unwrap();
    assert!(a2.read().peer.points_to(&a2));
}

#[test]
fn sharing_is_preserved_not_duplicated() {
    let registry = registry();
    let items: Vec<Owned<Item>> = (0..3).map(|value| Owned::new(Item { value })).collect();
    let group = Group {
        favorites: vec![items[2].share(), items[1].share()],
        pick: items[1].share(),
        items,
    };

    let bytes = save(&registry, &ObjectHandle::new(group)).unwrap();
    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.record_count(), 4);

    let group = graph.root().downcast::<Group>().unwrap();
    let group = group.read();
    let loaded: Vec<Handle<Item>> = group
        .items
        .iter()
        .map(|item| item.get().unwrap().clone())
        .collect();

    assert_eq!(loaded.len(), 3);
    for (expected, item) in loaded.iter().enumerate() {
        assert_eq!(item.read().value, expected as u32);
    }
    assert!(!Arc::ptr_eq(&loaded[0], &loaded[1]));
    assert!(!Arc::ptr_eq(&loaded[1], &loaded[2]));

    assert!(group.pick.points_to(&loaded[1]));
    assert!(group.favorites[0].points_to(&loaded[2]));
    assert!(group.favorites[1].points_to(&loaded[1]));
}

#[test]
fn null_references_round_trip() {
    let registry = registry();
    let group = Group {
        items: vec![Owned::new(Item { value: 7 }), Owned::none()],
        favorites: vec![Shared::none()],
        pick: Shared::none(),
    };

    let bytes = save(&registry, &ObjectHandle::new(group)).unwrap();
    // tag, items count, two slots
    assert_eq!(&bytes[12..16], &NULL_SLOT.to_le_bytes());

    let graph = load(&registry, &bytes).unwrap();
    let group = graph.root().downcast::<Group>().unwrap();
    let group = group.read();
    assert_eq!(group.items.len(), 2);
    assert!(group.items[0].is_some());
    assert!(group.items[1].is_none());
    assert_eq!(group.favorites.len(), 1);
    assert!(group.favorites[0].is_none());
    assert!(group.pick.is_none());
}

#[test]
fn value_and_object_lists_round_trip() {
    let registry = registry();
    let line = Polyline {
        points: vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-4.5, 0.25, 8.0]],
        segments: vec![B { data: 10 }, B { data: -20 }],
        label: Some("spline".into()),
    };

    let bytes = save(&registry, &ObjectHandle::new(line)).unwrap();
    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.record_count(), 1);

    let line = graph.root().downcast::<Polyline>().unwrap();
    let line = line.read();
    assert_eq!(line.points[1], [1.0, 2.0, 3.0]);
    assert_eq!(line.points.len(), 3);
    let data: Vec<i32> = line.segments.iter().map(|s| s.data).collect();
    assert_eq!(data, vec![10, -20]);
    assert_eq!(line.label.as_deref(), Some("spline"));
}

// ---------------------------------------------------------------------------
// Casts
// ---------------------------------------------------------------------------

#[test]
fn safe_cast_follows_hierarchy() {
    let registry = registry();
    let leaf = ObjectHandle::new(Leaf::default());
    let mid = ObjectHandle::new(Mid::default());

    let as_mid = registry.safe_cast(Mid::TAG, &leaf).unwrap();
    assert_eq!(as_mid.view_tag(), Mid::TAG);
    assert_eq!(as_mid.tag(), Leaf::TAG);
    assert!(registry.safe_cast(Base::TAG, &leaf).is_some());
    assert!(registry.safe_cast(Leaf::TAG, &mid).is_none());
    assert!(registry.safe_cast(Unrelated::TAG, &leaf).is_none());
}

#[test]
fn loaded_subclass_is_viewable_as_ancestors() {
    let registry = registry();
    let leaf = Leaf {
        base: Mid {
            base: Base { id: 42 },
            speed: 1.5,
        },
        color: [255, 128, 0, 255],
    };

    let bytes = save(&registry, &ObjectHandle::new(leaf)).unwrap();
    let graph = load(&registry, &bytes).unwrap();
    let root = graph.root();

    let as_base = registry.safe_cast(Base::TAG, root).unwrap();
    assert_eq!(registry.view::<Base, _>(&as_base, |b| b.id), Some(42));
    assert_eq!(registry.view::<Mid, _>(root, |m| m.speed), Some(1.5));
    assert_eq!(
        registry.view::<Leaf, _>(root, |l| l.color),
        Some([255, 128, 0, 255])
    );
    assert_eq!(registry.view::<Unrelated, _>(root, |_| ()), None);
}

// ---------------------------------------------------------------------------
// Load failures
// ---------------------------------------------------------------------------

#[test]
fn unknown_class_aborts_load() {
    let registry = registry();
    let bytes = save(&registry, &canonical_a()).unwrap();

    let mut partial = Registry::builder();
    partial
        .register_class::<B>()
        .unwrap()
        .register_class::<A>()
        .unwrap();
    let partial = partial.build();

    match load(&partial, &bytes) {
        Err(DeserializeError::UnknownClass { tag, offset }) => {
            assert_eq!(tag, C::TAG);
            assert_eq!(offset, 20);
        }
        other => panic!("expected UnknownClass, got {other:?}"),
    }

    assert!(matches!(
        load(&registry, &[0xde, 0xad, 0xbe, 0xef]),
        Err(DeserializeError::UnknownClass { offset: 0, .. })
    ));
}

#[test]
fn truncated_buffer_aborts_load() {
    let registry = registry();
    let bytes = save(&registry, &canonical_a()).unwrap();

    // Cutting at 20 leaves a complete A whose slot 1 is missing.
    for cut in (0..bytes.len()).filter(|&cut| cut != 20) {
        match load(&registry, &bytes[..cut]) {
            Err(DeserializeError::TruncatedStream { .. }) => {}
            other => panic!("cut at {cut}: expected TruncatedStream, got {other:?}"),
        }
    }
    assert!(matches!(
        load(&registry, &bytes[..20]),
        Err(DeserializeError::DanglingSlot { slot: 1, records: 1 })
    ));
}

fn group_record(items: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::new();
    put_u32(&mut bytes, Group::TAG.raw());
    put_u32(&mut bytes, items.len() as u32);
    for &slot in items {
        put_u32(&mut bytes, slot);
    }
    put_u32(&mut bytes, 0);
    put_u32(&mut bytes, NULL_SLOT);
    bytes
}

fn item_record(value: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    put_u32(&mut bytes, Item::TAG.raw());
    put_u32(&mut bytes, value);
    bytes
}

#[test]
fn hand_written_stream_loads() {
    let registry = registry();
    let mut bytes = group_record(&[1]);
    bytes.extend(item_record(5));

    let graph = load(&registry, &bytes).unwrap();
    let group = graph.root().downcast::<Group>().unwrap();
    let value = group.read().items[0].get().unwrap().read().value;
    assert_eq!(value, 5);
}

#[test]
fn second_owner_is_rejected_on_load() {
    let registry = registry();

    let mut twice = group_record(&[1, 1]);
    twice.extend(item_record(5));
    assert!(matches!(
        load(&registry, &twice),
        Err(DeserializeError::Ownership(OwnershipError::MultipleOwners { slot: 1 }))
    ));
}

fn node_record(child: u32, peer: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    put_u32(&mut bytes, Node::TAG.raw());
    // empty name: u64 length prefix
    bytes.extend_from_slice(&0u64.to_le_bytes());
    put_u32(&mut bytes, child);
    put_u32(&mut bytes, peer);
    bytes
}

#[test]
fn self_owning_record_loads() {
    let registry = registry();
    let bytes = node_record(0, NULL_SLOT);

    let graph = load(&registry, &bytes).unwrap();
    let node = graph.root().downcast::<Node>().unwrap();
    assert!(Arc::ptr_eq(node.read().child.get().unwrap(), &node));
    node.write().child.take();
}

#[test]
fn deep_owned_chain_loads_without_recursion() {
    const DEPTH: u32 = 100_000;
    let registry = registry();
    let mut bytes = Vec::with_capacity(DEPTH as usize * 20);
    for slot in 0..DEPTH {
        let child = if slot + 1 < DEPTH { slot + 1 } else { NULL_SLOT };
        bytes.extend(node_record(child, 0));
    }

    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.record_count(), DEPTH as usize);
    assert_eq!(graph.retained().len(), 1);
    let root = graph.root().downcast::<Node>().unwrap();
    drop(graph);

    // Unlink iteratively so dropping the chain does not recurse either.
    let mut length = 1;
    let mut next = root.write().child.take();
    while let Some(node) = next {
        assert!(node.read().peer.points_to(&root));
        length += 1;
        next = node.write().child.take();
    }
    assert_eq!(length, DEPTH);
}

#[test]
fn reference_to_wrong_class_is_rejected() {
    let registry = registry();
    let mut bytes = group_record(&[1]);
    bytes.extend(group_record(&[]));

    assert!(matches!(
        load(&registry, &bytes),
        Err(DeserializeError::TypeMismatch {
            field: "items",
            expected: "Item",
            ..
        })
    ));
}

#[test]
fn slot_past_last_record_is_rejected() {
    let registry = registry();
    let mut bytes = group_record(&[5]);
    bytes.extend(item_record(1));
    assert!(matches!(
        load(&registry, &bytes),
        Err(DeserializeError::DanglingSlot { slot: 5, records: 2 })
    ));
}

#[test]
fn load_limits_bound_corrupt_buffers() {
    let registry = registry();

    let mut huge = Vec::new();
    put_u32(&mut huge, Group::TAG.raw());
    put_u32(&mut huge, u32::MAX - 1);
    assert!(matches!(
        load(&registry, &huge),
        Err(DeserializeError::LimitExceeded {
            what: "collection length",
            ..
        })
    ));

    let mut short = Vec::new();
    put_u32(&mut short, Group::TAG.raw());
    put_u32(&mut short, 1000);
    assert!(matches!(
        load(&registry, &short),
        Err(DeserializeError::TruncatedStream { .. })
    ));

    let bytes = save(&registry, &canonical_a()).unwrap();
    let mut deserializer = Deserializer::new(&registry).with_config(LoadConfig {
        max_records: 1,
        ..LoadConfig::default()
    });
    assert!(matches!(
        deserializer.load(&bytes),
        Err(DeserializeError::LimitExceeded {
            what: "record count",
            limit: 1,
            found: 2,
        })
    ));
}

// ---------------------------------------------------------------------------
// Save failures
// ---------------------------------------------------------------------------

#[test]
fn unregistered_class_aborts_save() {
    let mut builder = Registry::builder();
    builder.register_class::<B>().unwrap().register_class::<A>().unwrap();
    let partial = builder.build();

    assert!(matches!(
        save(&partial, &canonical_a()),
        Err(SerializeError::UnregisteredClass { tag }) if tag == C::TAG
    ));

    let empty = Registry::builder().build();
    assert!(matches!(
        save(&empty, &ObjectHandle::new(B::default())),
        Err(SerializeError::UnregisteredClass { .. })
    ));
}

#[test]
fn two_owners_abort_save() {
    let registry = registry();
    let item = handle(Item { value: 1 });
    let group = Group {
        items: vec![Owned::from_handle(item.clone()), Owned::from_handle(item)],
        ..Default::default()
    };

    assert!(matches!(
        save(&registry, &ObjectHandle::new(group)),
        Err(SerializeError::Ownership(OwnershipError::MultipleOwners { slot: 1 }))
    ));
}

#[test]
fn owning_cycle_round_trips() {
    let registry = registry();
    let a = handle(Node {
        name: "a".into(),
        ..Default::default()
    });
    let b = handle(Node {
        name: "b".into(),
        ..Default::default()
    });
    a.write().child = Owned::from_handle(b.clone());
    b.write().child = Owned::from_handle(a.clone());

    let bytes = save(&registry, &ObjectHandle::from_handle(a.clone())).unwrap();
    b.write().child.take();

    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.record_count(), 2);
    let a2 = graph.root().downcast::<Node>().unwrap();
    let b2 = a2.read().child.get().unwrap().clone();
    assert_eq!(b2.read().name, "b");
    assert!(Arc::ptr_eq(b2.read().child.get().unwrap(), &a2));
    b2.write().child.take();
}

#[test]
fn dangling_shared_follows_save_policy() {
    let registry = registry();
    let gone = handle(Item { value: 3 });
    let group = ObjectHandle::new(Group {
        pick: Shared::to(&gone),
        ..Default::default()
    });
    drop(gone);

    let bytes = save(&registry, &group).unwrap();
    let graph = load(&registry, &bytes).unwrap();
    let loaded = graph.root().downcast::<Group>().unwrap();
    assert!(loaded.read().pick.is_none());

    let strict = SaveConfig {
        dangling_shared: DanglingShared::Error,
    };
    let mut serializer = Serializer::new(&registry).with_config(strict);
    assert!(matches!(
        serializer.save(&group),
        Err(SerializeError::DanglingShared { field: "pick" })
    ));
}

// ---------------------------------------------------------------------------
// Serializer objects
// ---------------------------------------------------------------------------

#[test]
fn serializer_and_deserializer_are_reusable() {
    let registry = registry();
    let a = canonical_a();
    let group = ObjectHandle::new(Group {
        items: vec![Owned::new(Item { value: 9 })],
        ..Default::default()
    });

    let mut serializer = Serializer::new(&registry);
    let first = serializer.save(&a).unwrap();
    let other = serializer.save(&group).unwrap();
    let second = serializer.save(&a).unwrap();
    assert_eq!(first, second);
    assert_ne!(first, other);

    let mut deserializer = Deserializer::new(&registry);
    assert!(deserializer.load(&first[..3]).is_err());
    let one = deserializer.load(&first).unwrap();
    let two = deserializer.load(&first).unwrap();
    assert!(!one.root().ptr_eq(two.root()));
    assert_eq!(one.record_tags(), two.record_tags());
}

#[test]
fn config_file_drives_serializer() {
    let registry = registry();
    let config = PersistConfig::from_toml_str("[save]\ndangling-shared = \"error\"\n").unwrap();
    let gone = handle(Item::default());
    let group = ObjectHandle::new(Group {
        favorites: vec![Shared::to(&gone)],
        ..Default::default()
    });
    drop(gone);

    let mut serializer = Serializer::new(&registry).with_config(config.save);
    assert!(matches!(
        serializer.save(&group),
        Err(SerializeError::DanglingShared { field: "favorites" })
    ));
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn registration_rules() {
    let mut builder = Registry::builder();
    builder.register_class::<B>().unwrap();
    builder.register_class::<B>().unwrap();
    assert_eq!(builder.len(), 1);

    let conflicting = ClassDescriptor::new(B::TAG, "NotB", None, C::default, Fields::<C>::of());
    assert!(matches!(
        builder.register(conflicting),
        Err(RegistrationError::DuplicateTag { existing: "B", name: "NotB", .. })
    ));
    assert!(matches!(
        builder.register_class::<Mid>(),
        Err(RegistrationError::UnknownParent { name: "Mid", .. })
    ));
}

#[test]
fn global_registry_installs_once() {
    let installed = registry().install().unwrap();
    let global = Registry::global().unwrap();
    assert!(std::ptr::eq(installed, global));
    assert!(global.contains(A::TAG));
    assert!(matches!(
        registry().install(),
        Err(RegistrationError::AlreadyInstalled)
    ));
}

#[test]
fn manually_described_class_round_trips() {
    #[derive(Default)]
    struct Counter {
        hits: u64,
    }

    let tag = TypeTag::from_fourcc(b"CNTR");
    let mut fields = Fields::<Counter>::new();
    fields.value("hits", |c| &c.hits, |c| &mut c.hits);

    let mut builder = Registry::builder();
    builder
        .register(ClassDescriptor::new(tag, "Counter", None, Counter::default, fields))
        .unwrap();
    let registry = builder.build();

    let object = ObjectHandle::from_tagged(tag, handle(Counter { hits: 12 }));
    let bytes = save(&registry, &object).unwrap();
    let graph = load(&registry, &bytes).unwrap();
    assert_eq!(graph.root_tag(), tag);
    assert_eq!(registry.lookup(tag).unwrap().fields().len(), 1);
}

// ---------------------------------------------------------------------------
// Resource-backed references
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CountingCache {
    inner: MemoryResourceCache,
    lookups: Mutex<Vec<String>>,
}

impl ResourceCache for CountingCache {
    fn lookup_resource(&self, key: &str) -> Option<ObjectHandle> {
        self.lookups.lock().push(key.to_owned());
        self.inner.lookup_resource(key)
    }

    fn cache_resource(&self, key: &str, object: ObjectHandle) {
        self.inner.cache_resource(key, object);
    }
}

fn texture(name: &str, pixel: u32) -> Handle<Texture> {
    handle(Texture {
        name: name.into(),
        pixels: vec![pixel; 4],
    })
}

/// Two materials referencing two textures four times.
fn library_bytes(registry: &Registry) -> Vec<u8> {
    let brick = texture("brick", 0xff0000ff);
    let moss = texture("moss", 0xff00ff00);
    let library = Library {
        materials: vec![
            Owned::new(Material {
                albedo: Shared::to(&brick),
                detail: Shared::to(&moss),
            }),
            Owned::new(Material {
                albedo: Shared::to(&moss),
                detail: Shared::to(&brick),
            }),
        ],
        textures: vec![Shared::to(&brick), Shared::to(&moss)],
    };
    save(registry, &ObjectHandle::new(library)).unwrap()
}

#[test]
fn resource_cache_is_queried_once_per_key() {
    let registry = registry();
    let bytes = library_bytes(&registry);
    let cache = CountingCache::default();

    let graph = Deserializer::new(&registry)
        .with_resource_cache(&cache)
        .load(&bytes)
        .unwrap();

    let mut lookups = cache.lookups.lock().clone();
    lookups.sort();
    assert_eq!(lookups, vec!["brick", "moss"]);
    assert_eq!(cache.inner.keys(), vec!["brick", "moss"]);

    let library = graph.root().downcast::<Library>().unwrap();
    let library = library.read();
    let brick = library.textures[0].upgrade().unwrap();
    let first = library.materials[0].get().unwrap().read();
    assert!(first.albedo.points_to(&brick));
    let cached = cache.inner.lookup_resource("brick").unwrap();
    assert!(cached.is(&brick));
}

#[test]
fn resident_resource_replaces_stream_copy() {
    let registry = registry();
    let bytes = library_bytes(&registry);

    let resident = texture("brick", 0x12345678);
    let cache = CountingCache::default();
    cache
        .inner
        .cache_resource("brick", ObjectHandle::from_handle(resident.clone()));

    let graph = Deserializer::new(&registry)
        .with_resource_cache(&cache)
        .load(&bytes)
        .unwrap();
    assert_eq!(cache.lookups.lock().len(), 2);

    let library = graph.root().downcast::<Library>().unwrap();
    let library = library.read();
    assert!(library.textures[0].points_to(&resident));
    for material in &library.materials {
        let material = material.get().unwrap().read();
        let bound = [&material.albedo, &material.detail];
        assert!(bound.iter().any(|shared| shared.points_to(&resident)));
    }
    assert!(cache
        .inner
        .lookup_resource("brick")
        .unwrap()
        .is(&resident));
    assert!(cache.inner.contains("moss"));
}

#[test]
fn failed_load_leaves_cache_untouched() {
    let registry = registry();
    let mut bytes = library_bytes(&registry);
    // Library: tag, materials count, two slots, textures count, then slots.
    // Point the second texture at a material.
    bytes[24..28].copy_from_slice(&1u32.to_le_bytes());

    let cache = CountingCache::default();
    let result = Deserializer::new(&registry)
        .with_resource_cache(&cache)
        .load(&bytes);

    assert!(matches!(
        result,
        Err(DeserializeError::TypeMismatch {
            field: "textures",
            ..
        })
    ));
    assert!(!cache.lookups.lock().is_empty());
    assert!(cache.inner.is_empty());
}

#[test]
fn without_cache_resources_bind_to_loaded_copies() {
    let registry = registry();
    let bytes = library_bytes(&registry);
    let graph = load(&registry, &bytes).unwrap();

    let library = graph.root().downcast::<Library>().unwrap();
    let library = library.read();
    let moss = library.textures[1].upgrade().unwrap();
    assert_eq!(moss.read().name, "moss");
    let second = library.materials[1].get().unwrap().read();
    assert!(second.albedo.points_to(&moss));
}
