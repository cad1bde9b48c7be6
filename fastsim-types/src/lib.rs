//! Shared types for fastsim
//!
//! This crate provides the leaf types used across the fastsim workspace:
//! entity and relation identifiers, the process-wide identity allocator,
//! simulation time stamps and rigid-body poses.

pub mod pose;

pub use pose::{Pose3D, PoseConfig, Quaternion, Vec3};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide counter backing [`Id::allocate`] and [`RelationId::allocate`].
///
/// Never reset, so an allocated token is never handed out twice in one process.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::SeqCst)
}

/// Entity identifier
///
/// Entities are usually named by configuration (`"world"`, `"box1"`), but
/// code that creates entities at runtime can ask the allocator for a fresh
/// one. Cloning is cheap; the name is reference counted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(Arc<str>);

impl Id {
    /// Prefix reserved for allocated identifiers
    pub const ALLOCATED_PREFIX: &'static str = "_id";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Allocate an identifier distinct from every other allocated one in this process
    pub fn allocate() -> Self {
        Self::new(format!("{}{}", Self::ALLOCATED_PREFIX, next_token()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Id::new(name)
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Id::new(name)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Id::from)
    }
}

/// Relation (transform edge) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId(pub u64);

impl RelationId {
    /// Allocate a relation identifier that is never reused in this process
    pub fn allocate() -> Self {
        Self(next_token())
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rel:{}", self.0)
    }
}

/// Simulation time stamp in seconds
///
/// Totally ordered (via [`f64::total_cmp`]) so it can key a pose history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocated_ids_are_unique() {
        let ids: HashSet<Id> = (0..1000).map(|_| Id::allocate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_allocation_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| RelationId::allocate()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_named_id_equality() {
        let a = Id::new("box1");
        let b: Id = "box1".into();
        assert_eq!(a, b);
        assert_ne!(a, Id::new("box2"));
        assert_eq!(a.to_string(), "box1");
    }

    #[test]
    fn test_time_ordering() {
        assert!(Time(-1.0) < Time::ZERO);
        assert!(Time(0.5) < Time(1.0));
        assert_eq!(Time(2.0), Time(2.0));
    }
}
