use crate::plugin::{Plugin, PluginConfig};
use fastsim_world::{Id, Snapshot, UpdateRequest, Version};
use serde::Deserialize;

/// Logs the pose of its entity in the root frame whenever the world changes
#[derive(Debug, Default)]
pub struct PoseLogger {
    settings: Settings,
    last_version: Option<Version>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Settings {
    /// Log on every tick instead of only when a new snapshot arrives
    every_tick: bool,
}

impl PoseLogger {
    pub const KEY: &'static str = "pose_logger";

    /// Version of the last snapshot this plugin reported on
    pub fn last_version(&self) -> Option<Version> {
        self.last_version
    }
}

impl Plugin for PoseLogger {
    fn name(&self) -> &str {
        Self::KEY
    }

    fn configure(&mut self, config: &PluginConfig, _entity: Option<&Id>) -> anyhow::Result<()> {
        self.settings = config.deserialize()?;
        Ok(())
    }

    fn process(&mut self, world: &Snapshot, entity: Option<&Id>, _dt: f64, _request: &mut UpdateRequest) {
        if !self.settings.every_tick && self.last_version == Some(world.version()) {
            return;
        }
        self.last_version = Some(world.version());

        let Some(entity) = entity else {
            tracing::info!(version = %world.version(), objects = world.len(), "World");
            return;
        };

        match world.transform(entity, world.root()) {
            Ok(pose) => tracing::info!(version = %world.version(), entity = %entity, %pose, "Pose"),
            Err(error) => tracing::debug!(version = %world.version(), entity = %entity, %error, "No pose"),
        }
    }
}
