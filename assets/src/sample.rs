//! A small but complete character graph, used by `asset-inspect demo` and
//! the tests.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use parking_lot::RwLock;
use redlilium_persist::{Class, Handle, MemoryResourceCache, ObjectHandle, ResourceCache, Shared};

use crate::animation::{Animation, Track};
use crate::character::{attach, Character, Transform};
use crate::mesh::{Mesh, SkinnedMesh};
use crate::skeleton::{Joint, Skeleton};

/// Resource names used by [`sample_character`].
pub const SKELETON: &str = "skeletons/biped";
pub const BODY_MESH: &str = "meshes/body";
pub const SWORD_MESH: &str = "meshes/sword";
pub const CAPE_SKIN: &str = "skins/cape";

fn resident<T: Class>(cache: &MemoryResourceCache, key: &str, value: T) -> Handle<T> {
    let handle = Arc::new(RwLock::new(value));
    cache.cache_resource(key, ObjectHandle::from_handle(handle.clone()));
    handle
}

fn biped() -> Skeleton {
    let joint = |name: &str, parent: Option<usize>, y: f32| {
        Joint::new(name, parent, Mat4::from_translation(Vec3::new(0.0, -y, 0.0)))
    };
    Skeleton::new(
        SKELETON,
        vec![
            joint("hips", None, 1.0),
            joint("spine", Some(0), 1.3),
            joint("head", Some(1), 1.7),
            joint("hand_r", Some(1), 1.4),
        ],
    )
}

fn clip(name: &str, skeleton: &Handle<Skeleton>, joints: &[u32]) -> Animation {
    let mut animation = Animation::new(name, Shared::to(skeleton));
    for &joint in joints {
        let mut track = Track::new(joint);
        for step in 0..=4 {
            let time = step as f32 * 0.25;
            track.push_key(
                time,
                Quat::from_rotation_y(time * std::f32::consts::PI),
                Vec3::new(0.0, (time * 4.0).sin() * 0.1, 0.0),
            );
        }
        animation.add_track(track);
    }
    animation
}

/// Builds a hero holding a sword.
///
/// The skeleton, meshes, and skin are placed in `cache`, which owns them; the
/// characters only share them. The hero owns two animations and the sword
/// attachment, which points back at the hero.
pub fn sample_character(cache: &MemoryResourceCache) -> Handle<Character> {
    let skeleton = resident(cache, SKELETON, biped());
    let body = resident(cache, BODY_MESH, Mesh::cube(BODY_MESH));
    let sword = resident(cache, SWORD_MESH, Mesh::cube(SWORD_MESH));
    let cape = resident(cache, CAPE_SKIN, SkinnedMesh::rigid(Mesh::cube(CAPE_SKIN), 1));

    let hero = Character::new("hero")
        .with_skeleton(&skeleton)
        .with_mesh(&body)
        .with_skin(&cape)
        .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -3.0)))
        .with_animation(clip("idle", &skeleton, &[0, 1]))
        .with_animation(clip("swing", &skeleton, &[1, 3]));
    let hero = Arc::new(RwLock::new(hero));

    let blade = Character::new("sword")
        .with_skeleton(&skeleton)
        .with_mesh(&sword)
        .with_transform(Transform::from_translation(Vec3::new(0.3, 1.4, 0.0)));
    attach(&hero, blade);
    hero
}
