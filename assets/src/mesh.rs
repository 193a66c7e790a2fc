//! Static and skinned triangle meshes.

use glam::{Vec3, Vec4};
use redlilium_persist::{Class, Fields, TypeTag};

use crate::asset::{Aabb, Asset};

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub base: Asset,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl Mesh {
    /// Builds a mesh and computes its bounds.
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(&positions);
        Self {
            base: Asset::new(name),
            positions,
            normals,
            indices,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Unit cube centred on the origin, one normal per face vertex.
    pub fn cube(name: impl Into<String>) -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in FACES {
            let (normal, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let first = positions.len() as u32;
            for (su, sv) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                positions.push((normal + u * su + v * sv) * 0.5);
                normals.push(normal);
            }
            indices.extend_from_slice(&[first, first + 1, first + 2, first, first + 2, first + 3]);
        }
        Self::new(name, positions, normals, indices)
    }
}

impl Class for Mesh {
    const TAG: TypeTag = TypeTag::from_fourcc(b"MESH");
    const NAME: &'static str = "Mesh";
    const PARENT: Option<TypeTag> = Some(Asset::TAG);

    fn describe(fields: &mut Fields<Self>) {
        fields
            .base("base", |m| &m.base, |m| &mut m.base)
            .value_list("positions", |m| &m.positions, |m| &mut m.positions)
            .value_list("normals", |m| &m.normals, |m| &mut m.normals)
            .value_list("indices", |m| &m.indices, |m| &mut m.indices)
            .value("bounds", |m| &m.bounds, |m| &mut m.bounds)
            .resource_key(|m| m.base.name.as_str());
    }
}

/// Mesh deformed by a skeleton: up to four joint influences per vertex.
#[derive(Debug, Clone, Default)]
pub struct SkinnedMesh {
    pub base: Mesh,
    pub joint_indices: Vec<[u16; 4]>,
    pub joint_weights: Vec<Vec4>,
}

impl SkinnedMesh {
    /// Binds every vertex of `mesh` fully to `joint`.
    pub fn rigid(mesh: Mesh, joint: u16) -> Self {
        let count = mesh.vertex_count();
        Self {
            base: mesh,
            joint_indices: vec![[joint, 0, 0, 0]; count],
            joint_weights: vec![Vec4::X; count],
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }
}

impl Class for SkinnedMesh {
    const TAG: TypeTag = TypeTag::from_fourcc(b"SKMS");
    const NAME: &'static str = "SkinnedMesh";
    const PARENT: Option<TypeTag> = Some(Mesh::TAG);

    fn describe(fields: &mut Fields<Self>) {
        fields
            .base("base", |s| &s.base, |s| &mut s.base)
            .value_list("joint_indices", |s| &s.joint_indices, |s| &mut s.joint_indices)
            .value_list("joint_weights", |s| &s.joint_weights, |s| &mut s.joint_weights)
            .resource_key(|s| s.base.base.name.as_str());
    }
}
