//! Parent/child pose relations with a short pose history

use fastsim_types::{Id, Pose3D, RelationId, Time};
use std::collections::BTreeMap;

/// Bounded, time-ordered pose history of one relation
///
/// Lookups between two samples interpolate; lookups outside the recorded
/// range clamp to the nearest sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformCache {
    samples: BTreeMap<Time, Pose3D>,
    capacity: usize,
}

impl TransformCache {
    /// Default number of samples kept per relation
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TransformCache {
            samples: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a pose; the oldest sample is evicted when the cache is full
    pub fn insert(&mut self, time: Time, pose: Pose3D) {
        self.samples.insert(time, pose);
        while self.samples.len() > self.capacity {
            self.samples.pop_first();
        }
    }

    /// The most recent sample
    pub fn latest(&self) -> Option<(Time, Pose3D)> {
        self.samples.last_key_value().map(|(t, p)| (*t, *p))
    }

    /// Pose at `time`, interpolated between the bracketing samples
    pub fn pose_at(&self, time: Time) -> Option<Pose3D> {
        let before = self.samples.range(..=time).next_back();
        let after = self.samples.range(time..).next();

        match (before, after) {
            (Some((t0, p0)), Some((t1, p1))) => {
                if t0 == t1 {
                    return Some(*p0);
                }
                let s = (time.0 - t0.0) / (t1.0 - t0.0);
                Some(p0.interpolate(p1, s))
            }
            (Some((_, p)), None) | (None, Some((_, p))) => Some(*p),
            (None, None) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Directed edge from a parent entity to a child entity
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: RelationId,
    pub parent: Id,
    pub child: Id,
    pub cache: TransformCache,
}

impl Relation {
    pub fn new(id: RelationId, parent: Id, child: Id) -> Self {
        Relation {
            id,
            parent,
            child,
            cache: TransformCache::new(),
        }
    }

    /// Pose of the child in the parent's frame at `time`
    ///
    /// A relation always holds at least one sample once it is part of a
    /// snapshot; the identity fallback only covers a freshly constructed one.
    pub fn pose_at(&self, time: Time) -> Pose3D {
        self.cache.pose_at(time).unwrap_or_default()
    }

    /// Most recent pose of the child in the parent's frame
    pub fn latest_pose(&self) -> Pose3D {
        self.cache.latest().map(|(_, p)| p).unwrap_or_default()
    }
}
