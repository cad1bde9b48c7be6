//! The coordinator: owns the authoritative snapshot and drives global steps

use crate::builder::{build_world, ConfigIssue, ModelLibrary};
use crate::config::{SimulatorConfig, WorldConfig};
use crate::container::PluginContainer;
use crate::error::{LoadError, StepError};
use crate::plugin::PluginConfig;
use crate::registry::{PluginLoader, PluginRegistry};
use fastsim_world::{ApplyError, Id, Pose3D, Snapshot, Time, TransformError, Version};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one [`Simulator::step`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Version of the authoritative snapshot after the step
    pub version: Version,
    /// Requests applied
    pub applied: usize,
    /// Containers whose request was rejected, in registration order
    pub rejected: Vec<String>,
}

impl StepReport {
    /// Whether the step left the world unchanged
    pub fn is_idle(&self) -> bool {
        self.applied == 0
    }
}

/// Outcome of [`Simulator::configure`]
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Objects that were skipped, and plugins that failed to load
    pub issues: Vec<ConfigIssue>,
    /// Containers registered for the world's objects
    pub containers: Vec<String>,
}

/// Snapshot-coordinated plugin simulator
///
/// `step` is not reentrant; it takes `&mut self`, so concurrent steps on one
/// simulator are ruled out by the borrow checker.
#[derive(Debug)]
pub struct Simulator {
    world: Arc<Snapshot>,
    containers: Vec<PluginContainer>,
    loader: PluginLoader,
    time: Time,
    step_count: u64,
}

impl Simulator {
    /// A simulator holding only the root `world`, with no search paths
    pub fn new(registry: PluginRegistry) -> Self {
        Self::with_config(SimulatorConfig::default(), registry)
    }

    pub fn with_config(config: SimulatorConfig, registry: PluginRegistry) -> Self {
        Self {
            world: Snapshot::with_root(Id::new(config.root)),
            containers: Vec::new(),
            loader: PluginLoader::new(registry).with_search_paths(config.plugin_paths),
            time: Time::ZERO,
            step_count: 0,
        }
    }

    /// Seed the world from a world description
    ///
    /// All objects go in as one update request, together with the plugin
    /// bindings of every plugin that loaded. Invalid objects and plugins that
    /// fail to load are reported in the returned [`BuildReport`]; a request
    /// that breaks the world's tree structure is rejected as a whole and no
    /// container is started.
    pub fn configure(&mut self, config: &WorldConfig) -> Result<BuildReport, ApplyError> {
        for dir in config.plugin_dirs() {
            self.loader.add_search_path(dir);
        }

        let mut models = ModelLibrary::from_config(config);
        let mut output = build_world(&mut models, &self.world, &config.objects);
        let mut report = BuildReport {
            issues: output.issues,
            containers: Vec::new(),
        };

        let mut loaded: Vec<(String, PluginContainer)> = Vec::new();
        for spec in output.plugins {
            if loaded.iter().any(|(_, c)| c.name() == spec.name) {
                let e = LoadError::DuplicateName(spec.name);
                report.issues.push(ConfigIssue::new(spec.path, e.to_string()));
                continue;
            }
            match self.prepare_container(&spec.name, &spec.library, &spec.config, Some(spec.entity.clone()), spec.period) {
                Ok(container) => {
                    output.request.bind_plugin(spec.entity, spec.name);
                    loaded.push((spec.path, container));
                }
                Err(e) => report.issues.push(ConfigIssue::new(spec.path, e.to_string())),
            }
        }

        let next = self.world.apply(&output.request)?;
        self.publish(next);

        for (path, container) in loaded {
            let name = container.name().to_string();
            match self.register(container) {
                Ok(()) => report.containers.push(name),
                Err(e) => report.issues.push(ConfigIssue::new(path, e.to_string())),
            }
        }

        tracing::info!(
            version = %self.world.version(),
            objects = self.world.len(),
            containers = report.containers.len(),
            issues = report.issues.len(),
            "World configured"
        );
        Ok(report)
    }

    /// Load `library`, wrap it in a container named `name`, and start it
    ///
    /// On error no container is registered.
    pub fn load_plugin(
        &mut self,
        name: &str,
        library: &str,
        config: &PluginConfig,
        entity: Option<Id>,
        period: Duration,
    ) -> Result<(), LoadError> {
        let container = self.prepare_container(name, library, config, entity, period)?;
        self.register(container)
    }

    /// A configured, not yet started container
    fn prepare_container(
        &self,
        name: &str,
        library: &str,
        config: &PluginConfig,
        entity: Option<Id>,
        period: Duration,
    ) -> Result<PluginContainer, LoadError> {
        if self.container(name).is_some() {
            return Err(LoadError::DuplicateName(name.to_string()));
        }

        let mut container = PluginContainer::new(name, Arc::clone(&self.world));
        if let Err(e) = container.load(&self.loader, library, config, entity, period) {
            tracing::warn!(container = name, library, error = %e, "Failed to load plugin");
            return Err(e);
        }
        Ok(container)
    }

    /// Register a configured (or already running) container and start it
    pub fn register(&mut self, mut container: PluginContainer) -> Result<(), LoadError> {
        if self.container(container.name()).is_some() {
            return Err(LoadError::DuplicateName(container.name().to_string()));
        }

        container.set_snapshot(Arc::clone(&self.world));
        container.start()?;
        self.containers.push(container);
        Ok(())
    }

    /// Advance the simulation by one global step
    ///
    /// Pending requests are collected in registration order and applied one
    /// after another. A request that breaks the world's invariants is
    /// rejected on its own and reported back to its container; the others
    /// still go in. When nothing is pending the world is left untouched.
    ///
    /// Every snapshot `apply` returns already satisfies
    /// [`Snapshot::validate`], so [`StepError::Invariant`] only surfaces if
    /// that guarantee is broken; the merged world is then dropped and the
    /// previous one stays authoritative.
    pub fn step(&mut self, dt: f64) -> Result<StepReport, StepError> {
        self.time = Time(self.time.0 + dt);
        self.step_count += 1;

        let pending: Vec<_> = self
            .containers
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.take_pending_request().map(|req| (i, req)))
            .collect();

        if pending.is_empty() {
            return Ok(self.report(0, Vec::new()));
        }

        let mut next = Arc::clone(&self.world);
        let mut applied = 0;
        let mut rejected = Vec::new();
        for (i, request) in pending {
            let container = &self.containers[i];
            match next.apply(&request) {
                Ok(world) => {
                    next = world;
                    applied += 1;
                }
                Err(error) => {
                    tracing::warn!(container = container.name(), %error, "Rejected update request");
                    rejected.push(container.name().to_string());
                    container.notify_rejected(error);
                }
            }
        }

        if applied == 0 {
            return Ok(self.report(0, rejected));
        }

        if let Err(source) = next.validate() {
            tracing::error!(version = %next.version(), error = %source, "Step aborted");
            return Err(StepError::Invariant {
                version: next.version(),
                source,
            });
        }

        self.publish(next);
        tracing::debug!(
            version = %self.world.version(),
            applied,
            rejected = rejected.len(),
            "Step committed"
        );
        Ok(self.report(applied, rejected))
    }

    /// Make `world` authoritative and hand it to every container
    fn publish(&mut self, world: Arc<Snapshot>) {
        if Arc::ptr_eq(&world, &self.world) {
            return;
        }
        self.world = world;
        for container in &self.containers {
            container.set_snapshot(Arc::clone(&self.world));
        }
    }

    fn report(&self, applied: usize, rejected: Vec<String>) -> StepReport {
        StepReport {
            version: self.world.version(),
            applied,
            rejected,
        }
    }

    /// The current authoritative snapshot
    pub fn world(&self) -> Arc<Snapshot> {
        Arc::clone(&self.world)
    }

    /// Pose of `source` in the frame of `target` in the current snapshot
    pub fn transform(&self, source: &Id, target: &Id) -> Result<Pose3D, TransformError> {
        self.world.transform(source, target)
    }

    /// Registered containers, in registration order
    pub fn containers(&self) -> &[PluginContainer] {
        &self.containers
    }

    pub fn container(&self, name: &str) -> Option<&PluginContainer> {
        self.containers.iter().find(|c| c.name() == name)
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Simulated time: the sum of all step deltas
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Stop every container, in registration order
    pub fn shutdown(&mut self) {
        for container in &mut self.containers {
            container.stop();
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
