//! Integration tests for snapshot application and transform lookup

use fastsim_world::{Id, Pose3D, ShapeRef, Snapshot, Time, UpdateRequest, Version};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const NAMES: &[&str] = &["world", "a", "b", "c", "d", "e"];

#[derive(Debug, Clone)]
enum Op {
    Remove(usize),
    SetType(usize),
    SetPose(usize, usize, f64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NAMES.len()).prop_map(Op::Remove),
        (0..NAMES.len()).prop_map(Op::SetType),
        (0..NAMES.len(), 0..NAMES.len(), -5.0f64..5.0).prop_map(|(p, c, x)| Op::SetPose(p, c, x)),
    ]
}

fn build_request(ops: &[Op]) -> UpdateRequest {
    let mut req = UpdateRequest::new();
    for op in ops {
        match op {
            Op::Remove(i) => {
                req.remove(NAMES[*i]);
            }
            Op::SetType(i) => {
                req.set_type(NAMES[*i], "thing");
            }
            Op::SetPose(p, c, x) => {
                req.set_pose(NAMES[*p], NAMES[*c], Pose3D::from_translation(*x, 0.0, 0.0), Time::ZERO);
            }
        }
    }
    req
}

proptest! {
    #[test]
    fn prop_tree_invariant_holds_after_every_apply(
        batches in prop::collection::vec(prop::collection::vec(op_strategy(), 0..6), 1..12)
    ) {
        let mut current = Snapshot::with_root(Id::new("world"));

        for ops in &batches {
            let req = build_request(ops);
            let before = Arc::clone(&current);

            match current.apply(&req) {
                Ok(next) => {
                    prop_assert!(next.validate().is_ok());
                    prop_assert!(next.version() >= before.version());
                    if req.is_empty() {
                        prop_assert!(Arc::ptr_eq(&next, &before));
                    } else {
                        prop_assert_eq!(next.version(), before.version().next());
                    }

                    let mut children = HashSet::new();
                    for rel in next.relations() {
                        prop_assert!(children.insert(rel.child.clone()));
                        prop_assert!(next.contains(&rel.parent));
                        prop_assert!(next.contains(&rel.child));
                    }
                    prop_assert!(next.parent(next.root()).is_none());
                    current = next;
                }
                Err(_) => {
                    // Rejected requests leave the published snapshot as it was
                    prop_assert!(current.validate().is_ok());
                    prop_assert_eq!(current.version(), before.version());
                }
            }
        }
    }

    #[test]
    fn prop_empty_request_returns_base(
        ops in prop::collection::vec(op_strategy(), 0..8)
    ) {
        let base = Snapshot::with_root(Id::new("world"));
        let base = base.apply(&build_request(&ops)).unwrap_or(base);

        let same = base.apply(&UpdateRequest::new()).unwrap();
        prop_assert!(Arc::ptr_eq(&base, &same));
        prop_assert!(same.same_content(&base));
    }
}

#[test]
fn test_box_under_root_resolves_to_its_pose() {
    let world = Snapshot::with_root(Id::new("world"));

    let mut req = UpdateRequest::new();
    req.set_type("box1", "box").set_pose(
        "world",
        "box1",
        Pose3D::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
        Time::ZERO,
    );
    let next = world.apply(&req).unwrap();

    let pose = next.transform(&Id::new("box1"), &Id::new("world")).unwrap();
    let xyz_rpy = pose.to_xyz_rpy();
    for (got, want) in xyz_rpy.iter().zip([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]) {
        assert!((got - want).abs() < 1e-9, "{:?}", xyz_rpy);
    }
}

#[test]
fn test_versions_count_applied_requests() {
    let mut current = Snapshot::with_root(Id::new("world"));
    for i in 0..5 {
        let mut req = UpdateRequest::new();
        req.set_type(format!("crate{}", i), "crate");
        current = current.apply(&req).unwrap();
    }
    assert_eq!(current.version(), Version(5));
    assert_eq!(current.len(), 6);
}

#[test]
fn test_objects_listing() {
    let mut req = UpdateRequest::new();
    req.set_type("table", "table")
        .set_shape("table", ShapeRef::new("meshes/table.obj"))
        .set_pose("world", "table", Pose3D::from_translation(1.0, 0.0, 0.0), Time::ZERO)
        .set_type("cup", "cup")
        .set_pose("table", "cup", Pose3D::from_translation(0.0, 0.0, 0.8), Time::ZERO)
        .bind_plugin("cup", "cup-mover");
    let world = Snapshot::with_root(Id::new("world")).apply(&req).unwrap();

    insta::assert_yaml_snapshot!(world.objects(), @r###"
    - id: cup
      type: cup
      plugins:
        - cup-mover
    - id: table
      type: table
      shape: meshes/table.obj
    - id: world
      type: root
    "###);
}
