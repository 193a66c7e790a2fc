//! Characters: the top-level graph tying assets together.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use parking_lot::RwLock;
use redlilium_persist::{Class, Fields, Handle, Owned, Shared, TypeTag};

use crate::animation::Animation;
use crate::mesh::{Mesh, SkinnedMesh};
use crate::skeleton::Skeleton;

/// Local transform decomposed into translation, rotation, and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Class for Transform {
    const TAG: TypeTag = TypeTag::from_fourcc(b"XFRM");
    const NAME: &'static str = "Transform";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("translation", |t| &t.translation, |t| &mut t.translation)
            .value("rotation", |t| &t.rotation, |t| &mut t.rotation)
            .value("scale", |t| &t.scale, |t| &mut t.scale);
    }
}

/// A skinned character with optional attached sub-characters.
///
/// Resources (skeleton, meshes, skins) are shared and owned by the resource
/// cache. Animations and attachments belong to the character. Each
/// attachment points back at its holder through `parent`.
#[derive(Debug, Default)]
pub struct Character {
    pub name: String,
    pub transform: Transform,
    pub skeleton: Shared<Skeleton>,
    pub meshes: Vec<Shared<Mesh>>,
    pub skins: Vec<Shared<SkinnedMesh>>,
    pub animations: Vec<Owned<Animation>>,
    pub attachments: Vec<Owned<Character>>,
    pub parent: Shared<Character>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_skeleton(mut self, skeleton: &Handle<Skeleton>) -> Self {
        self.skeleton = Shared::to(skeleton);
        self
    }

    pub fn with_mesh(mut self, mesh: &Handle<Mesh>) -> Self {
        self.meshes.push(Shared::to(mesh));
        self
    }

    pub fn with_skin(mut self, skin: &Handle<SkinnedMesh>) -> Self {
        self.skins.push(Shared::to(skin));
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animations.push(Owned::new(animation));
        self
    }

    /// Finds an owned animation by name.
    pub fn animation(&self, name: &str) -> Option<&Handle<Animation>> {
        self.animations
            .iter()
            .filter_map(Owned::get)
            .find(|clip| clip.read().name() == name)
    }
}

/// Makes `child` an attachment of `holder` and points it back at `holder`.
///
/// Returns the attachment's handle.
pub fn attach(holder: &Handle<Character>, mut child: Character) -> Handle<Character> {
    child.parent = Shared::to(holder);
    let handle = Arc::new(RwLock::new(child));
    holder
        .write()
        .attachments
        .push(Owned::from_handle(handle.clone()));
    handle
}

impl Class for Character {
    const TAG: TypeTag = TypeTag::from_fourcc(b"CHAR");
    const NAME: &'static str = "Character";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("name", |c| &c.name, |c| &mut c.name)
            .embedded("transform", |c| &c.transform, |c| &mut c.transform)
            .resource("skeleton", |c| &c.skeleton, |c| &mut c.skeleton)
            .resource_list("meshes", |c| &c.meshes, |c| &mut c.meshes)
            .resource_list("skins", |c| &c.skins, |c| &mut c.skins)
            .owned_list("animations", |c| &c.animations, |c| &mut c.animations)
            .owned_list("attachments", |c| &c.attachments, |c| &mut c.attachments)
            .shared("parent", |c| &c.parent, |c| &mut c.parent);
    }
}
