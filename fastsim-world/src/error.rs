//! Error types for applying requests and resolving transforms

use fastsim_types::Id;
use thiserror::Error;

/// A request that would break the world's tree structure
///
/// Any of these rejects the whole request; nothing of it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("relation {parent} -> {child} references parent '{parent}' which does not exist")]
    UnresolvedParent { parent: Id, child: Id },

    #[error("relation {parent} -> {child} references child '{child}' which does not exist")]
    UnknownChild { parent: Id, child: Id },

    #[error("entity '{child}' already has parent '{existing}', cannot also attach it to '{requested}'")]
    MultipleParents {
        child: Id,
        existing: Id,
        requested: Id,
    },

    #[error("relation {parent} -> {child} would create a cycle")]
    Cycle { parent: Id, child: Id },

    #[error("entity '{0}' cannot be its own parent")]
    SelfRelation(Id),

    #[error("the root entity '{0}' cannot be removed")]
    RemoveRoot(Id),

    #[error("the root entity '{root}' cannot be attached to '{parent}'")]
    RootHasParent { root: Id, parent: Id },

    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),
}

/// Failure to resolve a transform between two entities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("entity '{0}' not found")]
    UnknownEntity(Id),

    #[error("no relation chain connects '{from}' and '{to}'")]
    Disconnected { from: Id, to: Id },
}
