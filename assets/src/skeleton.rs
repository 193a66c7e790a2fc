//! Joint hierarchies for skinning.

use glam::Mat4;
use redlilium_persist::{Class, Fields, TypeTag};

use crate::asset::Asset;

/// One joint of a skeleton, stored by value inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Index of the parent joint, or `-1` for a root.
    pub parent: i32,
    pub inverse_bind: Mat4,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: -1,
            inverse_bind: Mat4::IDENTITY,
        }
    }
}

impl Joint {
    pub fn new(name: impl Into<String>, parent: Option<usize>, inverse_bind: Mat4) -> Self {
        Self {
            name: name.into(),
            parent: parent.map_or(-1, |p| p as i32),
            inverse_bind,
        }
    }

    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

impl Class for Joint {
    const TAG: TypeTag = TypeTag::from_fourcc(b"JOIN");
    const NAME: &'static str = "Joint";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("name", |j| &j.name, |j| &mut j.name)
            .value("parent", |j| &j.parent, |j| &mut j.parent)
            .value("inverse_bind", |j| &j.inverse_bind, |j| &mut j.inverse_bind);
    }
}

/// Named joint hierarchy. Joints are ordered parents first.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub base: Asset,
    pub joints: Vec<Joint>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>, joints: Vec<Joint>) -> Self {
        Self {
            base: Asset::new(name),
            joints,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Indices of joints without a parent.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parent_index().is_none())
            .map(|(i, _)| i)
    }

    /// Number of joints between `joint` and its root.
    pub fn depth(&self, joint: usize) -> usize {
        let mut depth = 0;
        let mut cursor = self.joints.get(joint).and_then(Joint::parent_index);
        while let Some(parent) = cursor {
            depth += 1;
            // Corrupt parent loop.
            if depth > self.joints.len() {
                break;
            }
            cursor = self.joints.get(parent).and_then(Joint::parent_index);
        }
        depth
    }
}

impl Class for Skeleton {
    const TAG: TypeTag = TypeTag::from_fourcc(b"SKEL");
    const NAME: &'static str = "Skeleton";
    const PARENT: Option<TypeTag> = Some(Asset::TAG);

    fn describe(fields: &mut Fields<Self>) {
        fields
            .base("base", |s| &s.base, |s| &mut s.base)
            .object_list("joints", |s| &s.joints, |s| &mut s.joints)
            .resource_key(|s| s.base.name.as_str());
    }
}
