//! Reading and writing asset graphs on disk.

use std::path::Path;

use redlilium_persist::{
    ConfigError, DeserializeError, Deserializer, LoadedGraph, ObjectHandle, PersistConfig,
    Registry, RegistrationError, ResourceCache, SerializeError, Serializer,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("save failed: {0}")]
    Save(#[from] SerializeError),
    #[error("load failed: {0}")]
    Load(#[from] DeserializeError),
}

/// Saves the graph rooted at `root` to `path`.
///
/// Returns the number of bytes written.
pub fn write_graph(
    path: &Path,
    registry: &Registry,
    config: &PersistConfig,
    root: &ObjectHandle,
) -> Result<usize, AssetError> {
    let bytes = Serializer::new(registry)
        .with_config(config.save.clone())
        .save(root)?;
    std::fs::write(path, &bytes)?;
    log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len())
}

/// Loads the graph stored at `path`.
pub fn read_graph(
    path: &Path,
    registry: &Registry,
    config: &PersistConfig,
    cache: Option<&dyn ResourceCache>,
) -> Result<LoadedGraph, AssetError> {
    let bytes = std::fs::read(path)?;
    let mut deserializer = Deserializer::new(registry).with_config(config.load.clone());
    if let Some(cache) = cache {
        deserializer = deserializer.with_resource_cache(cache);
    }
    Ok(deserializer.load(&bytes)?)
}
