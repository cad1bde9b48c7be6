use crate::plugin::{Plugin, PluginConfig};
use anyhow::bail;
use fastsim_types::{Quaternion, Vec3};
use fastsim_world::{ApplyError, Id, Pose3D, Snapshot, Time, UpdateRequest};
use serde::Deserialize;

/// Moves its entity at a constant velocity relative to the entity's parent
///
/// Every tick the current pose is read from the snapshot and advanced by
/// `dt`; a tick whose request is dropped is simply re-derived on the next
/// one.
#[derive(Debug, Default)]
pub struct Mover {
    settings: Settings,
    clock: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Settings {
    /// Linear velocity in the parent frame, m/s
    velocity: Velocity,
    /// Rotation rate around the vertical axis, rad/s
    yaw_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct Velocity {
    x: f64,
    y: f64,
    z: f64,
}

impl Mover {
    pub const KEY: &'static str = "mover";
}

impl Plugin for Mover {
    fn name(&self) -> &str {
        Self::KEY
    }

    fn configure(&mut self, config: &PluginConfig, entity: Option<&Id>) -> anyhow::Result<()> {
        if entity.is_none() {
            bail!("mover must be attached to an object");
        }
        let settings: Settings = config.deserialize()?;
        let v = settings.velocity;
        if ![v.x, v.y, v.z, settings.yaw_rate].iter().all(|c| c.is_finite()) {
            bail!("velocity and yaw_rate must be finite");
        }
        self.settings = settings;
        Ok(())
    }

    fn process(&mut self, world: &Snapshot, entity: Option<&Id>, dt: f64, request: &mut UpdateRequest) {
        self.clock += dt;
        let Some(entity) = entity else {
            return;
        };
        let Some(relation) = world.relation_of(entity) else {
            tracing::debug!(entity = %entity, "Entity has no parent, not moving it");
            return;
        };

        let current = relation.latest_pose();
        let v = self.settings.velocity;
        let step = Pose3D::new(
            Vec3::new(v.x, v.y, v.z).scale(dt),
            Quaternion::from_rpy(0.0, 0.0, self.settings.yaw_rate * dt),
        );
        let next = Pose3D::new(
            current.translation + step.translation,
            current.rotation * step.rotation,
        );

        if dt > 0.0 {
            request.set_pose(relation.parent.clone(), entity.clone(), next, Time(self.clock));
        }
    }

    fn on_rejected(&mut self, error: &ApplyError) {
        tracing::warn!(%error, "Move rejected, continuing from the next snapshot");
    }
}
