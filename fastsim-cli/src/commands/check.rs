//! Validate a world file without starting any plugin.

use anyhow::{bail, Context, Result};
use fastsim_runtime::{
    build_world, ConfigIssue, ModelLibrary, PluginLoader, PluginRegistry, WorldConfig, DEFAULT_ROOT,
};
use fastsim_world::{Id, Snapshot};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CheckSummary {
    objects: usize,
    plugins: usize,
    issues: Vec<IssueEntry>,
}

#[derive(Serialize)]
struct IssueEntry {
    path: String,
    message: String,
}

impl From<ConfigIssue> for IssueEntry {
    fn from(issue: ConfigIssue) -> Self {
        Self {
            path: issue.path,
            message: issue.message,
        }
    }
}

/// Build the world, resolve every plugin library and report what is wrong.
pub fn check_world(world_path: &Path, json: bool) -> Result<()> {
    let config = WorldConfig::from_file(world_path)
        .with_context(|| format!("Failed to load world file {}", world_path.display()))?;

    let base = Snapshot::with_root(Id::new(DEFAULT_ROOT));
    let mut models = ModelLibrary::from_config(&config);
    let output = build_world(&mut models, &base, &config.objects);
    let mut issues = output.issues;

    let loader = PluginLoader::new(PluginRegistry::with_builtins()).with_search_paths(config.plugin_dirs());
    for spec in &output.plugins {
        if let Err(e) = loader.resolve(&spec.library) {
            issues.push(ConfigIssue::new(spec.path.clone(), e.to_string()));
        }
    }

    let world = base
        .apply(&output.request)
        .context("World file does not describe a valid object tree")?;

    let summary = CheckSummary {
        // the root is not declared by the file
        objects: world.len().saturating_sub(1),
        plugins: output.plugins.len(),
        issues: issues.into_iter().map(IssueEntry::from).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Checked {}: {} objects, {} plugins, {} issues",
            world_path.display(),
            summary.objects,
            summary.plugins,
            summary.issues.len()
        );
        for issue in &summary.issues {
            println!("- {}: {}", issue.path, issue.message);
        }
    }

    if !summary.issues.is_empty() {
        bail!("{} issue(s) found in {}", summary.issues.len(), world_path.display());
    }
    Ok(())
}
