//! Error types for registration, saving, loading, and configuration.

use thiserror::Error;

use crate::tag::TypeTag;

/// Errors raised while building a [`Registry`](crate::Registry).
///
/// These are start-up failures: a registry that failed to build must not be
/// used for any save or load.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The tag is already bound to a different class descriptor.
    #[error("type tag {tag} is already bound to class '{existing}', cannot bind it to '{name}'")]
    DuplicateTag {
        tag: TypeTag,
        existing: &'static str,
        name: &'static str,
    },
    /// The class name is already bound to a different tag.
    #[error("class name '{name}' is already bound to type tag {existing}")]
    DuplicateName { name: &'static str, existing: TypeTag },
    /// The declared parent has not been registered yet.
    #[error("class '{name}' declares parent {parent}, which is not registered")]
    UnknownParent { name: &'static str, parent: TypeTag },
    /// A process-wide registry has already been installed.
    #[error("a process-wide class registry is already installed")]
    AlreadyInstalled,
}

/// A tag lookup missed the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type tag {0} is not registered")]
pub struct UnknownTag(pub TypeTag);

/// Violations of the owned-reference taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// Two owning references target the same object.
    #[error("object in slot {slot} has more than one owner")]
    MultipleOwners { slot: u32 },
}

/// Errors that abort a save.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// An object's runtime tag was never registered.
    #[error("class with type tag {tag} is not registered")]
    UnregisteredClass { tag: TypeTag },
    /// The object behind a handle is not the type registered under its tag.
    #[error("object tagged {tag} does not hold a '{expected}'")]
    TypeMismatch { tag: TypeTag, expected: &'static str },
    /// A shared reference points at an object that no longer exists.
    #[error("shared reference '{field}' points at a dropped object")]
    DanglingShared { field: &'static str },
    /// The graph breaks the ownership rules.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    /// A value field could not be encoded.
    #[error("failed to encode field '{field}': {message}")]
    Value { field: &'static str, message: String },
    /// The graph has more objects than slot indices.
    #[error("object graph exceeds the slot index range")]
    SlotOverflow,
}

/// Errors that abort a load.
///
/// Whatever was constructed before the error is dropped; no partial graph is
/// ever returned.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// A record carries a tag that is not in the registry.
    #[error("unknown class id {tag} at byte {offset}")]
    UnknownClass { tag: TypeTag, offset: usize },
    /// The buffer ended in the middle of a record.
    ///
    /// `needed` is exact for tags, slots, and counts, and a lower bound for
    /// value blobs.
    #[error("stream truncated at byte {offset}: {needed} more bytes needed")]
    TruncatedStream { offset: usize, needed: usize },
    /// A reference or embedded record resolved to the wrong class.
    #[error("field '{field}' expects '{expected}', found class {found}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: TypeTag,
    },
    /// A reference names a slot past the last record.
    #[error("reference to slot {slot}, but the stream holds {records} records")]
    DanglingSlot { slot: u32, records: u32 },
    /// The stream encodes an ill-formed ownership graph.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    /// A configured load limit was exceeded.
    #[error("{what} limit of {limit} exceeded ({found})")]
    LimitExceeded {
        what: &'static str,
        limit: u32,
        found: u64,
    },
    /// A value field could not be decoded.
    #[error("failed to decode field '{field}': {message}")]
    Value { field: &'static str, message: String },
}

/// Errors raised while reading a [`PersistConfig`](crate::PersistConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
