//! Update requests: batches of proposed world mutations
//!
//! A request is inert data. It is built by one producer (a plugin or the
//! entity builder) against the snapshot it was given, and consumed by one
//! [`Snapshot::apply`](crate::Snapshot::apply).

use crate::entity::ShapeRef;
use fastsim_types::{Id, Pose3D, Time};

/// Entity upsert operation
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOp {
    /// Create the entity or change its type
    SetType { id: Id, entity_type: String },

    /// Attach a geometry handle
    SetShape { id: Id, shape: ShapeRef },

    /// Record that a plugin container is bound to the entity
    BindPlugin { id: Id, plugin: String },
}

impl EntityOp {
    pub fn id(&self) -> &Id {
        match self {
            EntityOp::SetType { id, .. }
            | EntityOp::SetShape { id, .. }
            | EntityOp::BindPlugin { id, .. } => id,
        }
    }
}

/// Relation upsert: the child's pose in the parent frame at a given time
#[derive(Debug, Clone, PartialEq)]
pub struct PoseUpdate {
    pub parent: Id,
    pub child: Id,
    pub pose: Pose3D,
    pub time: Time,
}

/// A batch of operations, applied as removals, then entity upserts, then pose upserts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    removals: Vec<Id>,
    entity_ops: Vec<EntityOp>,
    poses: Vec<PoseUpdate>,
}

impl UpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, id: impl Into<Id>, entity_type: impl Into<String>) -> &mut Self {
        self.entity_ops.push(EntityOp::SetType {
            id: id.into(),
            entity_type: entity_type.into(),
        });
        self
    }

    pub fn set_shape(&mut self, id: impl Into<Id>, shape: ShapeRef) -> &mut Self {
        self.entity_ops.push(EntityOp::SetShape { id: id.into(), shape });
        self
    }

    pub fn bind_plugin(&mut self, id: impl Into<Id>, plugin: impl Into<String>) -> &mut Self {
        self.entity_ops.push(EntityOp::BindPlugin {
            id: id.into(),
            plugin: plugin.into(),
        });
        self
    }

    /// Set the child's pose relative to the parent, creating the relation if needed
    pub fn set_pose(
        &mut self,
        parent: impl Into<Id>,
        child: impl Into<Id>,
        pose: Pose3D,
        time: Time,
    ) -> &mut Self {
        self.poses.push(PoseUpdate {
            parent: parent.into(),
            child: child.into(),
            pose,
            time,
        });
        self
    }

    /// Remove an entity together with everything attached below it
    pub fn remove(&mut self, id: impl Into<Id>) -> &mut Self {
        self.removals.push(id.into());
        self
    }

    /// Stage a new entity under a freshly allocated identifier
    pub fn create_entity(&mut self, entity_type: impl Into<String>) -> Id {
        let id = Id::allocate();
        self.set_type(id.clone(), entity_type);
        id
    }

    /// Append all operations of `other` after this request's own
    pub fn merge(&mut self, other: UpdateRequest) {
        self.removals.extend(other.removals);
        self.entity_ops.extend(other.entity_ops);
        self.poses.extend(other.poses);
    }

    pub fn removals(&self) -> &[Id] {
        &self.removals
    }

    pub fn entity_ops(&self) -> &[EntityOp] {
        &self.entity_ops
    }

    pub fn poses(&self) -> &[PoseUpdate] {
        &self.poses
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.entity_ops.is_empty() && self.poses.is_empty()
    }

    /// Total number of operations
    pub fn len(&self) -> usize {
        self.removals.len() + self.entity_ops.len() + self.poses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request() {
        let req = UpdateRequest::new();
        assert!(req.is_empty());
        assert_eq!(req.len(), 0);
    }

    #[test]
    fn test_builder_chaining() {
        let mut req = UpdateRequest::new();
        req.set_type("a", "box")
            .set_pose("world", "a", Pose3D::identity(), Time::ZERO)
            .remove("b");

        assert_eq!(req.len(), 3);
        assert_eq!(req.entity_ops()[0].id(), &Id::new("a"));
        assert_eq!(req.removals(), &[Id::new("b")]);
    }

    #[test]
    fn test_create_entity_allocates() {
        let mut req = UpdateRequest::new();
        let a = req.create_entity("crate");
        let b = req.create_entity("crate");
        assert_ne!(a, b);
        assert_eq!(req.entity_ops().len(), 2);
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut first = UpdateRequest::new();
        first.set_type("a", "x");
        let mut second = UpdateRequest::new();
        second.set_type("a", "y");

        first.merge(second);
        match &first.entity_ops()[1] {
            EntityOp::SetType { entity_type, .. } => assert_eq!(entity_type, "y"),
            other => panic!("unexpected op {:?}", other),
        }
    }
}
