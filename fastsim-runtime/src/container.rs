//! Plugin containers: one plugin, one thread, one mailbox
//!
//! A container owns a loaded [`Plugin`] and runs it on a dedicated thread at
//! a fixed period. The coordinator talks to a running container through two
//! short critical sections only: publishing a snapshot and taking the staged
//! request.
//!
//! ```text
//!   coordinator                         worker thread
//!   ───────────                         ─────────────
//!   set_snapshot(v) ──▶ [world slot] ──▶ read Arc<Snapshot>
//!                                        process(world, entity, dt, &mut req)
//!   take_pending_request() ◀── [mailbox] ◀── offer(req)   (dropped if occupied)
//! ```

use crate::error::{ContainerError, LoadError};
use crate::mailbox::Mailbox;
use crate::plugin::{Plugin, PluginConfig};
use crate::registry::PluginLoader;
use fastsim_world::{ApplyError, Id, Snapshot, UpdateRequest};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle of a container
///
/// `Unloaded → Configured → Running → Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Unloaded,
    Configured,
    Running,
    Stopped,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Unloaded => "unloaded",
            ContainerState::Configured => "configured",
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Counters of a container's worker loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// Completed `process` calls
    pub ticks: u64,
    /// Requests placed in the mailbox
    pub staged: u64,
    /// Non-empty requests discarded because the mailbox was occupied
    pub dropped: u64,
}

/// State shared between the container handle and its worker thread
struct Shared {
    name: String,
    world: RwLock<Arc<Snapshot>>,
    mailbox: Mailbox<UpdateRequest>,
    rejections: Mailbox<ApplyError>,
    stop: Mutex<bool>,
    wake: Condvar,
    ticks: AtomicU64,
    staged: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    fn is_stopping(&self) -> bool {
        *self.stop.lock()
    }

    /// Sleep for up to `timeout`, returning early when a stop is signalled
    fn sleep(&self, timeout: Duration) {
        let mut stopping = self.stop.lock();
        if !*stopping {
            self.wake.wait_for(&mut stopping, timeout);
        }
    }

    fn signal_stop(&self) {
        *self.stop.lock() = true;
        self.wake.notify_all();
    }

    fn stage(&self, request: UpdateRequest) {
        match self.mailbox.offer(request) {
            Ok(()) => {
                self.staged.fetch_add(1, Ordering::Relaxed);
            }
            Err(dropped) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    container = %self.name,
                    ops = dropped.len(),
                    "Mailbox occupied, dropping request"
                );
            }
        }
    }
}

/// Execution wrapper around one plugin
pub struct PluginContainer {
    name: String,
    entity: Option<Id>,
    period: Duration,
    state: ContainerState,
    plugin: Option<Box<dyn Plugin>>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl PluginContainer {
    /// An unloaded container that will first observe `world`
    pub fn new(name: impl Into<String>, world: Arc<Snapshot>) -> Self {
        let name = name.into();
        Self {
            shared: Arc::new(Shared {
                name: name.clone(),
                world: RwLock::new(world),
                mailbox: Mailbox::new(),
                rejections: Mailbox::new(),
                stop: Mutex::new(false),
                wake: Condvar::new(),
                ticks: AtomicU64::new(0),
                staged: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            name,
            entity: None,
            period: Duration::ZERO,
            state: ContainerState::Unloaded,
            plugin: None,
            thread: None,
        }
    }

    /// Bind a plugin instance to this container
    ///
    /// `period` is the minimum interval between two `process` calls; zero
    /// runs the plugin as fast as possible. If the plugin rejects its
    /// configuration the container stays `Unloaded`.
    pub fn configure(
        &mut self,
        mut plugin: Box<dyn Plugin>,
        config: &PluginConfig,
        entity: Option<Id>,
        period: Duration,
    ) -> Result<(), LoadError> {
        if self.state != ContainerState::Unloaded {
            return Err(LoadError::InvalidState {
                name: self.name.clone(),
                state: self.state,
                action: "configured",
            });
        }

        plugin
            .configure(config, entity.as_ref())
            .map_err(|e| LoadError::Configure {
                name: self.name.clone(),
                message: format!("{:#}", e),
            })?;

        self.plugin = Some(plugin);
        self.entity = entity;
        self.period = period;
        self.state = ContainerState::Configured;
        Ok(())
    }

    /// Resolve `library` through `loader`, then [`configure`](Self::configure) it
    pub fn load(
        &mut self,
        loader: &PluginLoader,
        library: &str,
        config: &PluginConfig,
        entity: Option<Id>,
        period: Duration,
    ) -> Result<(), LoadError> {
        let plugin = loader.instantiate(library)?;
        self.configure(plugin, config, entity, period)
    }

    /// Start the worker thread; calling it on a running container does nothing
    pub fn start(&mut self) -> Result<(), ContainerError> {
        match self.state {
            ContainerState::Running => return Ok(()),
            ContainerState::Unloaded => return Err(ContainerError::NotConfigured(self.name.clone())),
            ContainerState::Stopped => return Err(ContainerError::AlreadyStopped(self.name.clone())),
            ContainerState::Configured => {}
        }

        let plugin = self
            .plugin
            .take()
            .ok_or_else(|| ContainerError::NotConfigured(self.name.clone()))?;
        let shared = Arc::clone(&self.shared);
        let entity = self.entity.clone();
        let period = self.period;

        let spawned = thread::Builder::new()
            .name(format!("plugin-{}", self.name))
            .spawn(move || run_worker(plugin, shared, entity, period));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                self.state = ContainerState::Running;
                tracing::info!(
                    container = %self.name,
                    period_ms = self.period.as_secs_f64() * 1000.0,
                    "Plugin container started"
                );
                Ok(())
            }
            Err(source) => {
                // The plugin was moved into the failed closure; nothing is left to run
                self.state = ContainerState::Stopped;
                Err(ContainerError::Spawn {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Signal the worker to exit and wait for it
    ///
    /// An in-flight `process` call is finished first; none follows once this
    /// returns.
    pub fn stop(&mut self) {
        if self.state == ContainerState::Stopped {
            return;
        }

        self.shared.signal_stop();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!(container = %self.name, "Plugin thread panicked");
            }
            tracing::info!(container = %self.name, "Plugin container stopped");
        }
        self.plugin = None;
        self.state = ContainerState::Stopped;
    }

    /// Publish a snapshot to the worker
    ///
    /// Snapshots older than the one already visible are ignored, so the
    /// versions a worker observes never decrease. Returns whether the
    /// snapshot was taken.
    pub fn set_snapshot(&self, world: Arc<Snapshot>) -> bool {
        let mut current = self.shared.world.write();
        if world.version() < current.version() {
            return false;
        }
        *current = world;
        true
    }

    /// The snapshot the worker currently sees
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.world.read().clone()
    }

    /// Remove and return the staged request; the mailbox is empty afterwards
    pub fn take_pending_request(&self) -> Option<UpdateRequest> {
        self.shared.mailbox.take()
    }

    pub fn has_pending_request(&self) -> bool {
        self.shared.mailbox.is_occupied()
    }

    /// Hand a rejection back to the plugin; it sees it before its next tick
    pub fn notify_rejected(&self, error: ApplyError) {
        // One outstanding rejection is enough for the plugin to resynchronize
        let _ = self.shared.rejections.offer(error);
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            staged: self.shared.staged.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> Option<&Id> {
        self.entity.as_ref()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for PluginContainer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContainer")
            .field("name", &self.name)
            .field("entity", &self.entity)
            .field("period", &self.period)
            .field("state", &self.state)
            .field("pending", &self.has_pending_request())
            .finish()
    }
}

fn run_worker(mut plugin: Box<dyn Plugin>, shared: Arc<Shared>, entity: Option<Id>, period: Duration) {
    let mut last_tick: Option<Instant> = None;

    while !shared.is_stopping() {
        let dt = match last_tick {
            Some(last) => {
                let elapsed = last.elapsed();
                if elapsed < period {
                    shared.sleep(period - elapsed);
                    continue;
                }
                elapsed
            }
            None => Duration::ZERO,
        };
        last_tick = Some(Instant::now());

        if let Some(error) = shared.rejections.take() {
            plugin.on_rejected(&error);
        }

        let world = shared.world.read().clone();
        let mut request = UpdateRequest::new();
        plugin.process(&world, entity.as_ref(), dt.as_secs_f64(), &mut request);
        shared.ticks.fetch_add(1, Ordering::Relaxed);

        if !request.is_empty() {
            shared.stage(request);
        }

        if period.is_zero() {
            thread::yield_now();
        }
    }

    tracing::debug!(container = %shared.name, plugin = plugin.name(), "Worker loop exited");
}
