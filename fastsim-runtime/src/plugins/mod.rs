//! Plugins shipped with fastsim

mod mover;
mod pose_logger;

pub use mover::Mover;
pub use pose_logger::PoseLogger;

use crate::registry::PluginRegistry;

/// Register every built-in plugin under its library key
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register(PoseLogger::KEY, || Box::new(PoseLogger::default()));
    registry.register(Mover::KEY, || Box::new(Mover::default()));
}
