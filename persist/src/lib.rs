//! # RedLilium Persist
//!
//! Runtime persistence for graphs of engine objects: meshes, skeletons,
//! animations, and anything else that refers to other objects by pointer.
//!
//! ## Classes
//!
//! - [`TypeTag`] - Stable, manually assigned class identifier
//! - [`Class`] - Trait every persistent type implements
//! - [`Fields`] - Declarative, ordered field table of a class
//! - [`ClassDescriptor`] - Registered, type-erased form of a class
//! - [`Registry`] / [`RegistryBuilder`] - Tag lookup and checked downcasts
//!
//! ## Object references
//!
//! - [`Handle`] / [`ObjectHandle`] - Typed and type-erased object handles
//! - [`Owned`] - Owning reference; exactly one per owned object
//! - [`Shared`] - Non-owning reference; any number per object
//!
//! ## Serialization
//!
//! - [`Serializer`] / [`save`] - Graph to bytes
//! - [`Deserializer`] / [`load`] - Bytes to graph ([`LoadedGraph`])
//! - [`ResourceCache`] - Binds resource-backed references to resident
//!   instances
//! - [`PersistConfig`] - TOML-loadable serializer settings
//!
//! Sharing and cycles survive a round trip: an object reachable along several
//! paths is written once and every referrer is rebuilt pointing at the same
//! instance.

mod class;
mod collection;
pub mod config;
mod error;
mod fields;
mod handle;
mod registry;
mod resource;
mod serializer;
mod stream;
mod tag;

pub use class::{Class, ClassDescriptor};
pub use config::{DanglingShared, LoadConfig, PersistConfig, SaveConfig};
pub use error::{
    ConfigError, DeserializeError, OwnershipError, RegistrationError, SerializeError, UnknownTag,
};
pub use fields::{CollectionKind, FieldInfo, FieldKind, Fields};
pub use handle::{Handle, ObjectHandle, Owned, Shared};
pub use registry::{Registry, RegistryBuilder};
pub use resource::{MemoryResourceCache, ResourceCache};
pub use serializer::{load, save, Deserializer, LoadedGraph, Serializer};
pub use stream::NULL_SLOT;
pub use tag::TypeTag;
