//! Serializer configuration loaded from TOML.
//!
//! ```toml
//! [save]
//! dangling-shared = "error"
//!
//! [load]
//! max-records = 65536
//! max-collection-len = 1048576
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PersistConfig {
    pub save: SaveConfig,
    pub load: LoadConfig,
}

impl PersistConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// What to do with a shared reference whose referent was dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DanglingShared {
    /// Write the null slot and log a warning.
    #[default]
    WriteNull,
    /// Fail the save.
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SaveConfig {
    pub dangling_shared: DanglingShared,
}

/// Bounds on the work a single load may do.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoadConfig {
    /// Maximum number of records in one stream.
    pub max_records: u32,
    /// Maximum element count of one collection field.
    pub max_collection_len: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_records: 1 << 20,
            max_collection_len: 1 << 24,
        }
    }
}
