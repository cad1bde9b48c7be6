//! CLI command implementations.

pub mod check;
pub mod dump;
pub mod plugins;
pub mod run;

pub use check::check_world;
pub use plugins::list_plugins;
pub use run::{run_world, RunOptions};
