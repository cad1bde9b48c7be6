//! Transform resolution between entities of one snapshot

use crate::error::TransformError;
use crate::snapshot::Snapshot;
use fastsim_types::{Id, Pose3D, Time};

/// Pose of `source` expressed in the frame of `target` at `time`
///
/// Both ids are walked up to the top of their relation chains; the chains
/// must end in the same entity (normally the world root).
pub fn resolve(
    snapshot: &Snapshot,
    source: &Id,
    target: &Id,
    time: Option<Time>,
) -> Result<Pose3D, TransformError> {
    for id in [source, target] {
        if !snapshot.contains(id) {
            return Err(TransformError::UnknownEntity(id.clone()));
        }
    }

    let disconnected = || TransformError::Disconnected {
        from: source.clone(),
        to: target.clone(),
    };

    let (source_top, top_from_source) = chain_to_top(snapshot, source, time).ok_or_else(disconnected)?;
    let (target_top, top_from_target) = chain_to_top(snapshot, target, time).ok_or_else(disconnected)?;

    if source_top != target_top {
        return Err(disconnected());
    }

    Ok(top_from_target.inverse() * top_from_source)
}

/// Follow parents from `id` and compose the poses on the way
///
/// Returns the topmost entity reached and the pose of `id` in its frame, or
/// `None` if the walk does not terminate (a cycle in an unvalidated snapshot).
fn chain_to_top<'a>(
    snapshot: &'a Snapshot,
    id: &'a Id,
    time: Option<Time>,
) -> Option<(&'a Id, Pose3D)> {
    let mut current = id;
    let mut pose = Pose3D::identity();
    let max_depth = snapshot.len();

    for _ in 0..=max_depth {
        match snapshot.relation_of(current) {
            Some(rel) => {
                let step = match time {
                    Some(t) => rel.pose_at(t),
                    None => rel.latest_pose(),
                };
                pose = step * pose;
                current = &rel.parent;
            }
            None => return Some((current, pose)),
        }
    }

    None
}

impl Snapshot {
    /// Most recent pose of `source` in the frame of `target`
    pub fn transform(&self, source: &Id, target: &Id) -> Result<Pose3D, TransformError> {
        resolve(self, source, target, None)
    }

    /// Pose of `source` in the frame of `target`, looked up in each relation's history at `time`
    pub fn transform_at(&self, source: &Id, target: &Id, time: Time) -> Result<Pose3D, TransformError> {
        resolve(self, source, target, Some(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::UpdateRequest;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::Arc;

    fn id(name: &str) -> Id {
        Id::new(name)
    }

    fn table_world() -> Arc<Snapshot> {
        let mut req = UpdateRequest::new();
        req.set_type("table", "table")
            .set_type("cup", "cup")
            .set_type("lamp", "lamp")
            .set_pose(
                "world",
                "table",
                Pose3D::from_xyz_rpy(2.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2),
                Time::ZERO,
            )
            .set_pose("table", "cup", Pose3D::from_translation(0.5, 0.0, 0.8), Time::ZERO)
            .set_pose("world", "lamp", Pose3D::from_translation(0.0, 3.0, 0.0), Time::ZERO);
        Snapshot::with_root(id("world")).apply(&req).unwrap()
    }

    #[test]
    fn test_transform_to_root() {
        let world = table_world();
        let cup = world.transform(&id("cup"), &id("world")).unwrap();
        // Table is rotated by 90 degrees, so the cup's x offset becomes a y offset
        assert!(cup.approx_eq(&Pose3D::from_xyz_rpy(2.0, 0.5, 0.8, 0.0, 0.0, FRAC_PI_2), 1e-9));
    }

    #[test]
    fn test_transform_between_branches() {
        let world = table_world();
        let cup_in_lamp = world.transform(&id("cup"), &id("lamp")).unwrap();
        let expected = Pose3D::from_xyz_rpy(2.0, -2.5, 0.8, 0.0, 0.0, FRAC_PI_2);
        assert!(cup_in_lamp.approx_eq(&expected, 1e-9));

        let lamp_in_cup = world.transform(&id("lamp"), &id("cup")).unwrap();
        assert!((cup_in_lamp * lamp_in_cup).approx_eq(&Pose3D::identity(), 1e-9));
    }

    #[test]
    fn test_transform_to_self_is_identity() {
        let world = table_world();
        let pose = world.transform(&id("cup"), &id("cup")).unwrap();
        assert!(pose.approx_eq(&Pose3D::identity(), 1e-12));
    }

    #[test]
    fn test_unknown_entity() {
        let world = table_world();
        assert_eq!(
            world.transform(&id("ghost"), &id("world")),
            Err(TransformError::UnknownEntity(id("ghost")))
        );
    }

    #[test]
    fn test_detached_entity_is_disconnected() {
        let mut req = UpdateRequest::new();
        req.set_type("floating", "thing");
        let world = table_world().apply(&req).unwrap();

        assert!(matches!(
            world.transform(&id("floating"), &id("world")),
            Err(TransformError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_transform_at_time_interpolates() {
        let mut req = UpdateRequest::new();
        req.set_type("cart", "cart")
            .set_pose("world", "cart", Pose3D::from_translation(0.0, 0.0, 0.0), Time(0.0))
            .set_pose("world", "cart", Pose3D::from_translation(10.0, 0.0, 0.0), Time(1.0));
        let world = Snapshot::with_root(id("world")).apply(&req).unwrap();

        let at = world.transform_at(&id("cart"), &id("world"), Time(0.3)).unwrap();
        assert!(at.approx_eq(&Pose3D::from_translation(3.0, 0.0, 0.0), 1e-9));

        let latest = world.transform(&id("cart"), &id("world")).unwrap();
        assert!(latest.approx_eq(&Pose3D::from_translation(10.0, 0.0, 0.0), 1e-9));
    }
}
