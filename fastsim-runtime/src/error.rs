//! Error types for the fastsim runtime

use crate::container::ContainerState;
use fastsim_world::{ApplyError, Version};
use thiserror::Error;

/// Failure to resolve, instantiate or configure a plugin
///
/// A container whose load failed is never registered and never started.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("empty library name given")]
    EmptyLibrary,

    #[error("could not find library '{library}' (searched: {searched})")]
    LibraryNotFound { library: String, searched: String },

    #[error("library '{library}' does not provide a plugin named '{symbol}'")]
    MissingSymbol { library: String, symbol: String },

    #[error("plugin '{name}' rejected its configuration: {message}")]
    Configure { name: String, message: String },

    #[error("a plugin container named '{0}' is already registered")]
    DuplicateName(String),

    #[error("container '{name}' cannot be {action} while {state}")]
    InvalidState {
        name: String,
        state: ContainerState,
        action: &'static str,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Invalid lifecycle transition of a plugin container
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container '{0}' has no plugin loaded")]
    NotConfigured(String),

    #[error("container '{0}' has been stopped and cannot be restarted")]
    AlreadyStopped(String),

    #[error("failed to spawn worker thread for '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal failure of one global step
///
/// Nothing of the step is committed; the authoritative snapshot stays at its
/// previous version.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("merged snapshot {version} violates the world invariants: {source}")]
    Invariant {
        version: Version,
        #[source]
        source: ApplyError,
    },
}
