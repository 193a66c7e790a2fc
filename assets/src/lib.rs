//! # RedLilium Assets
//!
//! Persistent data assets built on [`redlilium_persist`].
//!
//! - [`Asset`] - Named base class shared by every resource
//! - [`Mesh`] / [`SkinnedMesh`] - Triangle meshes, optionally skinned
//! - [`Skeleton`] / [`Joint`] - Joint hierarchies
//! - [`Animation`] / [`Track`] - Keyframed clips bound to a skeleton
//! - [`Character`] - Ties resources together and owns its clips and
//!   attachments
//!
//! Call [`asset_registry`] (or [`register_asset_classes`] on an existing
//! builder) before saving or loading any of these types.

mod animation;
mod asset;
mod character;
mod file;
mod mesh;
pub mod sample;
mod skeleton;

pub use animation::{Animation, Track};
pub use asset::{Aabb, Asset};
pub use character::{attach, Character, Transform};
pub use file::{read_graph, write_graph, AssetError};
pub use mesh::{Mesh, SkinnedMesh};
pub use skeleton::{Joint, Skeleton};

use redlilium_persist::{Registry, RegistrationError, RegistryBuilder};

/// Registers every asset class. Parents are registered before children.
pub fn register_asset_classes(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder
        .register_class::<Asset>()?
        .register_class::<Mesh>()?
        .register_class::<SkinnedMesh>()?
        .register_class::<Joint>()?
        .register_class::<Skeleton>()?
        .register_class::<Track>()?
        .register_class::<Animation>()?
        .register_class::<Transform>()?
        .register_class::<Character>()?;
    Ok(())
}

/// A registry holding only the asset classes.
pub fn asset_registry() -> Result<Registry, RegistrationError> {
    let mut builder = Registry::builder();
    register_asset_classes(&mut builder)?;
    Ok(builder.build())
}
