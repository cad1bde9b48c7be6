//! Immutable, versioned world snapshots
//!
//! A [`Snapshot`] is published once and then only read. New snapshots are
//! derived with [`Snapshot::apply`], which shares every untouched entity and
//! relation with its base.

use crate::entity::{Entity, ROOT_TYPE, UNKNOWN_TYPE};
use crate::error::ApplyError;
use crate::relation::Relation;
use crate::request::{EntityOp, UpdateRequest};
use fastsim_types::{Id, RelationId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Snapshot version, bumped once per applied non-empty request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(pub u64);

impl Version {
    pub const ZERO: Version = Version(0);

    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One consistent instant of world state
#[derive(Clone)]
pub struct Snapshot {
    version: Version,
    root: Id,
    entities: HashMap<Id, Arc<Entity>>,
    relations: HashMap<RelationId, Arc<Relation>>,
    /// child -> its single incoming relation
    parent_of: HashMap<Id, RelationId>,
}

impl Snapshot {
    /// A world holding only its root entity, at version zero
    pub fn with_root(root: Id) -> Arc<Snapshot> {
        let mut entities = HashMap::new();
        entities.insert(root.clone(), Arc::new(Entity::new(root.clone(), ROOT_TYPE)));

        Arc::new(Snapshot {
            version: Version::ZERO,
            root,
            entities,
            relations: HashMap::new(),
            parent_of: HashMap::new(),
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn root(&self) -> &Id {
        &self.root
    }

    pub fn object(&self, id: &Id) -> Option<&Entity> {
        self.entities.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entities.contains_key(id)
    }

    /// All entities, ordered by identifier
    pub fn objects(&self) -> Vec<&Entity> {
        let mut objects: Vec<&Entity> = self.entities.values().map(Arc::as_ref).collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        objects
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The relation attaching `child` to its parent, if any
    pub fn relation_of(&self, child: &Id) -> Option<&Relation> {
        self.parent_of
            .get(child)
            .and_then(|rel| self.relations.get(rel))
            .map(Arc::as_ref)
    }

    pub fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(&id).map(Arc::as_ref)
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values().map(Arc::as_ref)
    }

    pub fn parent(&self, child: &Id) -> Option<&Id> {
        self.relation_of(child).map(|rel| &rel.parent)
    }

    /// Direct children of `id`, ordered by identifier
    pub fn children(&self, id: &Id) -> Vec<&Id> {
        let mut children: Vec<&Id> = self
            .relations
            .values()
            .filter(|rel| &rel.parent == id)
            .map(|rel| &rel.child)
            .collect();
        children.sort();
        children
    }

    /// Whether `ancestor` is reachable from `id` by following parents
    fn has_ancestor(&self, id: &Id, ancestor: &Id) -> bool {
        let mut current = id;
        // Bounded by the number of relations so a corrupt graph cannot loop forever
        for _ in 0..=self.relations.len() {
            if current == ancestor {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        true
    }

    /// Derive a new snapshot from this one plus `request`
    ///
    /// Returns this very snapshot when the request is empty. Otherwise the
    /// result carries the next version; on error nothing is applied.
    pub fn apply(self: &Arc<Self>, request: &UpdateRequest) -> Result<Arc<Snapshot>, ApplyError> {
        if request.is_empty() {
            return Ok(Arc::clone(self));
        }

        let mut next = (**self).clone();
        next.version = self.version.next();

        for id in request.removals() {
            next.remove_subtree(id)?;
        }

        for op in request.entity_ops() {
            next.upsert_entity(op);
        }

        let mut touched = Vec::with_capacity(request.poses().len());
        for update in request.poses() {
            if update.parent == update.child {
                return Err(ApplyError::SelfRelation(update.child.clone()));
            }
            if update.child == next.root {
                return Err(ApplyError::RootHasParent {
                    root: next.root.clone(),
                    parent: update.parent.clone(),
                });
            }

            let rel_id = match next.parent_of.get(&update.child) {
                Some(rel_id) => {
                    let existing = &next.relations[rel_id];
                    if existing.parent != update.parent {
                        return Err(ApplyError::MultipleParents {
                            child: update.child.clone(),
                            existing: existing.parent.clone(),
                            requested: update.parent.clone(),
                        });
                    }
                    *rel_id
                }
                None => {
                    let rel = Relation::new(
                        RelationId::allocate(),
                        update.parent.clone(),
                        update.child.clone(),
                    );
                    let rel_id = rel.id;
                    next.relations.insert(rel_id, Arc::new(rel));
                    next.parent_of.insert(update.child.clone(), rel_id);
                    rel_id
                }
            };

            if let Some(rel) = next.relations.get_mut(&rel_id) {
                Arc::make_mut(rel).cache.insert(update.time, update.pose);
            }
            touched.push(rel_id);
        }

        // Parents may be staged after their children within one batch, so
        // references are only resolved once every operation is in place.
        for rel_id in touched {
            let rel = &next.relations[&rel_id];
            if !next.entities.contains_key(&rel.parent) {
                return Err(ApplyError::UnresolvedParent {
                    parent: rel.parent.clone(),
                    child: rel.child.clone(),
                });
            }
            if !next.entities.contains_key(&rel.child) {
                return Err(ApplyError::UnknownChild {
                    parent: rel.parent.clone(),
                    child: rel.child.clone(),
                });
            }
            if next.has_ancestor(&rel.parent, &rel.child) {
                return Err(ApplyError::Cycle {
                    parent: rel.parent.clone(),
                    child: rel.child.clone(),
                });
            }
        }

        tracing::trace!(
            version = %next.version,
            ops = request.len(),
            entities = next.entities.len(),
            "Applied update request"
        );

        Ok(Arc::new(next))
    }

    fn upsert_entity(&mut self, op: &EntityOp) {
        let entry = self
            .entities
            .entry(op.id().clone())
            .or_insert_with(|| Arc::new(Entity::new(op.id().clone(), UNKNOWN_TYPE)));
        let entity = Arc::make_mut(entry);

        match op {
            EntityOp::SetType { entity_type, .. } => {
                entity.entity_type = entity_type.clone();
            }
            EntityOp::SetShape { shape, .. } => {
                entity.shape = Some(shape.clone());
            }
            EntityOp::BindPlugin { plugin, .. } => {
                if !entity.plugins.contains(plugin) {
                    entity.plugins.push(plugin.clone());
                }
            }
        }
    }

    fn remove_subtree(&mut self, id: &Id) -> Result<(), ApplyError> {
        if id == &self.root {
            return Err(ApplyError::RemoveRoot(id.clone()));
        }
        if !self.entities.contains_key(id) {
            return Ok(());
        }

        let mut doomed = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(&current).into_iter().cloned());
            doomed.insert(current);
        }

        for victim in &doomed {
            self.entities.remove(victim);
            if let Some(rel_id) = self.parent_of.remove(victim) {
                self.relations.remove(&rel_id);
            }
        }

        Ok(())
    }

    /// Check every structural invariant of the snapshot
    ///
    /// `apply` maintains these on its own; the check exists for callers that
    /// must not publish a snapshot they have not verified.
    pub fn validate(&self) -> Result<(), ApplyError> {
        if !self.entities.contains_key(&self.root) {
            return Err(ApplyError::Inconsistent(format!(
                "root '{}' is missing",
                self.root
            )));
        }
        if let Some(parent) = self.parent(&self.root) {
            return Err(ApplyError::RootHasParent {
                root: self.root.clone(),
                parent: parent.clone(),
            });
        }
        if self.parent_of.len() != self.relations.len() {
            return Err(ApplyError::Inconsistent(format!(
                "{} relations but {} parent links",
                self.relations.len(),
                self.parent_of.len()
            )));
        }

        let mut seen_children = HashSet::new();
        for rel in self.relations.values() {
            if !seen_children.insert(&rel.child) {
                return Err(ApplyError::Inconsistent(format!(
                    "entity '{}' has more than one incoming relation",
                    rel.child
                )));
            }
            if self.parent_of.get(&rel.child) != Some(&rel.id) {
                return Err(ApplyError::Inconsistent(format!(
                    "parent link of '{}' does not point at {}",
                    rel.child, rel.id
                )));
            }
            if !self.entities.contains_key(&rel.parent) {
                return Err(ApplyError::UnresolvedParent {
                    parent: rel.parent.clone(),
                    child: rel.child.clone(),
                });
            }
            if !self.entities.contains_key(&rel.child) {
                return Err(ApplyError::UnknownChild {
                    parent: rel.parent.clone(),
                    child: rel.child.clone(),
                });
            }
            if self.has_ancestor(&rel.parent, &rel.child) {
                return Err(ApplyError::Cycle {
                    parent: rel.parent.clone(),
                    child: rel.child.clone(),
                });
            }
        }

        Ok(())
    }

    /// Whether two snapshots hold the same entities and relations, ignoring versions
    pub fn same_content(&self, other: &Snapshot) -> bool {
        if self.root != other.root || self.entities != other.entities {
            return false;
        }
        self.parent_of.len() == other.parent_of.len()
            && self.parent_of.keys().all(|child| {
                match (self.relation_of(child), other.relation_of(child)) {
                    (Some(a), Some(b)) => a.parent == b.parent && a.cache == b.cache,
                    _ => false,
                }
            })
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("root", &self.root)
            .field("entities", &self.entities.len())
            .field("relations", &self.relations.len())
            .finish()
    }
}
