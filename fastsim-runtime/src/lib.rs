//! fastsim runtime - plugin containers and the step coordinator
//!
//! This crate hosts behavior plugins on their own threads and merges what they
//! propose into the shared world:
//!
//! - **Plugins**: the [`Plugin`] trait, configured from free-form YAML ([`PluginConfig`])
//! - **Registry & loader**: plugin keys, library search paths and resolution ([`PluginLoader`])
//! - **Containers**: one thread, one period and one single-slot [`Mailbox`] per plugin
//! - **Coordinator**: [`Simulator::step`] collects staged requests, applies them and publishes
//! - **Entity builder**: world files to a single initial update request
//!
//! ## Global step
//!
//! ```text
//!  containers (registration order)        Simulator
//!  ┌────────┐ take_pending_request()   ┌──────────────────┐
//!  │ mover  │ ───────────────────────▶ │ apply in order   │
//!  │ logger │ ───────────────────────▶ │ validate         │
//!  └────────┘ ◀─────────────────────── │ swap & publish   │
//!               set_snapshot(v+n)      └──────────────────┘
//! ```
//!
//! A step with nothing pending changes nothing. A rejected request is
//! reported to its plugin and does not hold back the others.
//!
//! ## Example
//!
//! ```rust
//! use fastsim_runtime::{PluginRegistry, Simulator, WorldConfig};
//! use fastsim_world::Id;
//!
//! let config = WorldConfig::parse(r#"
//! objects:
//!   - id: box1
//!     type: box
//!     pose: {x: 1}
//! "#).unwrap();
//!
//! let mut sim = Simulator::new(PluginRegistry::with_builtins());
//! let report = sim.configure(&config).unwrap();
//! assert!(report.issues.is_empty());
//!
//! sim.step(0.01).unwrap();
//! let pose = sim.transform(&Id::new("box1"), &Id::new("world")).unwrap();
//! assert_eq!(pose.to_xyz_rpy(), [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
//! ```

#![warn(missing_debug_implementations)]

pub mod builder;
pub mod config;
pub mod container;
pub mod error;
pub mod mailbox;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod simulator;

pub use builder::{build_world, BuildOutput, ConfigIssue, EntityBuilder, ModelLibrary, PluginSpec};
pub use config::{ConfigError, SimulatorConfig, WorldConfig, DEFAULT_ROOT};
pub use container::{ContainerState, ContainerStats, PluginContainer};
pub use error::{ContainerError, LoadError, StepError};
pub use mailbox::Mailbox;
pub use plugin::{Plugin, PluginConfig};
pub use registry::{library_key, PluginLoader, PluginRegistry};
pub use simulator::{BuildReport, Simulator, StepReport};
