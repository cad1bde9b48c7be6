//! Entities: the simulated objects

use fastsim_types::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of the designated world root
pub const ROOT_TYPE: &str = "root";

/// Type tag for entities created implicitly (referenced before being declared)
pub const UNKNOWN_TYPE: &str = "_unknown_";

/// Opaque handle into the geometry library (mesh path, primitive name, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeRef(pub String);

impl ShapeRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One simulated object
///
/// Entities carry no hierarchy of their own; parent/child structure lives in
/// the snapshot's relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Id,

    #[serde(rename = "type")]
    pub entity_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeRef>,

    /// Names of the plugin containers attached to this entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
}

impl Entity {
    pub fn new(id: Id, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            shape: None,
            plugins: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.entity_type == ROOT_TYPE
    }
}
