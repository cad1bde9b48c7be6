//! fastsim world model
//!
//! This crate holds the world state shared between the simulator's
//! coordinator and its plugin threads. World state is a [`Snapshot`]: an
//! immutable, versioned mapping from identifiers to entities and from
//! parent/child pairs to pose relations.
//!
//! # Architecture
//!
//! ```text
//! Snapshot(v) ──apply(UpdateRequest)──▶ Snapshot(v+1)
//!      │                                     │
//!      └──── entries shared via Arc ─────────┘
//! ```
//!
//! Snapshots are never mutated in place. [`Snapshot::apply`] builds a new
//! snapshot on top of a base one; unchanged entities and relations are shared
//! with the base through reference counting, so only touched entries need new
//! storage. A request is applied atomically: if any of its operations would
//! break the tree invariant the whole request is rejected and the base is
//! returned untouched to the caller.
//!
//! ## Key Features
//!
//! - **Copy-on-write layering**: readers holding an `Arc<Snapshot>` are never
//!   affected by later updates
//! - **Deterministic apply order**: removals, then entity upserts, then pose upserts
//! - **Transform resolution**: compose pose chains between any two connected entities
//! - **Pose history**: each relation keeps a short, interpolating [`TransformCache`]
//!
//! # Example
//!
//! ```rust
//! use fastsim_types::{Id, Pose3D, Time};
//! use fastsim_world::{Snapshot, UpdateRequest};
//!
//! let world = Snapshot::with_root(Id::new("world"));
//!
//! let mut req = UpdateRequest::new();
//! req.set_type("box1", "box");
//! req.set_pose("world", "box1", Pose3D::from_translation(1.0, 0.0, 0.0), Time::ZERO);
//!
//! let next = world.apply(&req).unwrap();
//! assert_eq!(next.version().0, world.version().0 + 1);
//!
//! let pose = next.transform(&Id::new("box1"), &Id::new("world")).unwrap();
//! assert!(pose.approx_eq(&Pose3D::from_translation(1.0, 0.0, 0.0), 1e-9));
//! ```

#![warn(missing_debug_implementations)]

pub mod entity;
pub mod error;
pub mod relation;
pub mod request;
pub mod snapshot;
pub mod transform;

pub use entity::{Entity, ShapeRef, ROOT_TYPE, UNKNOWN_TYPE};
pub use error::{ApplyError, TransformError};
pub use relation::{Relation, TransformCache};
pub use request::{EntityOp, PoseUpdate, UpdateRequest};
pub use snapshot::{Snapshot, Version};

pub use fastsim_types::{Id, Pose3D, RelationId, Time};
