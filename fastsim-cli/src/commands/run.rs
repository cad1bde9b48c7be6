//! Drive a world at a fixed step rate.

use super::dump::WorldDump;
use anyhow::{bail, Context, Result};
use fastsim_runtime::{PluginRegistry, Simulator, SimulatorConfig, WorldConfig};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

pub struct RunOptions {
    pub plugin_paths: Vec<PathBuf>,
    /// Steps per second; 0 runs unthrottled
    pub rate: f64,
    pub steps: u64,
    pub dump: bool,
}

impl RunOptions {
    fn period(&self) -> Result<Duration> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            bail!("--rate must be a non-negative number, got {}", self.rate);
        }
        if self.rate == 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(1.0 / self.rate)
            .with_context(|| format!("--rate {} gives no usable step period", self.rate))
    }
}

pub fn run_world(world_path: &Path, opts: RunOptions) -> Result<()> {
    let period = opts.period()?;

    let world = WorldConfig::from_file(world_path)
        .with_context(|| format!("Failed to load world file {}", world_path.display()))?;

    let config = SimulatorConfig {
        plugin_paths: opts.plugin_paths.clone(),
        ..SimulatorConfig::default()
    };
    let mut sim = Simulator::with_config(config, PluginRegistry::with_builtins());
    let report = sim
        .configure(&world)
        .context("World file does not describe a valid object tree")?;
    for issue in &report.issues {
        tracing::warn!(path = %issue.path, "{}", issue.message);
    }

    let dt = period.as_secs_f64();
    let started = Instant::now();
    for _ in 0..opts.steps {
        let tick = Instant::now();
        let step = sim.step(dt).context("Simulation step failed")?;
        if !step.rejected.is_empty() {
            tracing::debug!(rejected = ?step.rejected, "Some requests were rejected");
        }
        if let Some(remaining) = period.checked_sub(tick.elapsed()) {
            thread::sleep(remaining);
        }
    }
    sim.shutdown();

    let world = sim.world();
    tracing::info!(
        steps = sim.step_count(),
        version = %world.version(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Simulation finished"
    );

    if opts.dump {
        let dump = WorldDump::capture(&world, sim.time());
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        println!(
            "Ran {} steps: {} objects, {} containers, world {}",
            sim.step_count(),
            world.len(),
            sim.containers().len(),
            world.version()
        );
    }

    Ok(())
}
