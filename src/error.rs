//! Host-facing error type for the synthesis engine.
//!
//! This is distinct from the in-engine exception/warning registry
//! (see [`crate::diag`]): that registry is a flow-control mechanism
//! consulted by the scheduler during a tick, while `MurmurError` is
//! what the public operations in [`crate::engine`] return to a caller.

use std::fmt;

/// Errors returned by the public system/engine/resource operations.
#[derive(Debug)]
pub enum MurmurError {
    /// A null or zero-length memory region was handed to `initialize`.
    NullPtrAccess,
    /// An argument was out of its documented range.
    InvalidArgument(String),
    /// The arena could not satisfy an allocation request.
    OutOfMem,
    /// A handle (system, engine, resource) no longer refers to a live object.
    InvalidHandle,
    /// `load_resource` could not open the underlying source.
    CantOpenFile(String),
    /// The source did not begin with the expected resource magic.
    UnexpectedFileType,
    /// The resource's directory or header was inconsistent.
    FileCorrupt(String),
    /// `unload_resource` was called while the resource's lock count was nonzero.
    ResourceBusy,
    /// `create_voice_definition` was called with a name already registered.
    NameConflict(String),
    /// `add_resource_to_voice_definition` referenced an unregistered resource.
    NameUndefined(String),
    /// `create_voice` referenced a resource name with no loaded resource.
    ResourceMissing(String),
    /// `create_voice` could not find a mandatory knowledge base.
    KbMissing,
    /// `new_engine` was called while an engine already existed.
    MaxNumExceeded,
}

impl fmt::Display for MurmurError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MurmurError::NullPtrAccess => write!(f, "null pointer access"),
            MurmurError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            MurmurError::OutOfMem => write!(f, "out of memory"),
            MurmurError::InvalidHandle => write!(f, "invalid handle"),
            MurmurError::CantOpenFile(msg) => write!(f, "can't open file: {msg}"),
            MurmurError::UnexpectedFileType => write!(f, "unexpected file type"),
            MurmurError::FileCorrupt(msg) => write!(f, "file corrupt: {msg}"),
            MurmurError::ResourceBusy => write!(f, "resource busy"),
            MurmurError::NameConflict(name) => write!(f, "name conflict: {name}"),
            MurmurError::NameUndefined(name) => write!(f, "name undefined: {name}"),
            MurmurError::ResourceMissing(name) => write!(f, "resource missing: {name}"),
            MurmurError::KbMissing => write!(f, "knowledge base missing"),
            MurmurError::MaxNumExceeded => write!(f, "max number of engines exceeded"),
        }
    }
}

impl std::error::Error for MurmurError {}
