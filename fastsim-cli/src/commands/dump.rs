//! JSON view of a snapshot.

use fastsim_world::{Snapshot, Time};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WorldDump {
    pub version: u64,
    pub time: f64,
    pub root: String,
    pub objects: Vec<ObjectDump>,
}

#[derive(Debug, Serialize)]
pub struct ObjectDump {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
    /// `[x, y, z, roll, pitch, yaw]` in the root frame; absent when detached
    pub pose: Option<[f64; 6]>,
}

impl WorldDump {
    pub fn capture(world: &Snapshot, time: Time) -> Self {
        let objects = world
            .objects()
            .into_iter()
            .map(|entity| ObjectDump {
                id: entity.id.to_string(),
                entity_type: entity.entity_type.clone(),
                parent: world.parent(&entity.id).map(ToString::to_string),
                shape: entity.shape.as_ref().map(|s| s.as_str().to_string()),
                plugins: entity.plugins.clone(),
                pose: world
                    .transform(&entity.id, world.root())
                    .ok()
                    .map(|pose| pose.to_xyz_rpy()),
            })
            .collect();

        Self {
            version: world.version().0,
            time: time.seconds(),
            root: world.root().to_string(),
            objects,
        }
    }
}
