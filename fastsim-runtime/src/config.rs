//! World file parsing

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read world file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Identifier of the world root when none is configured
pub const DEFAULT_ROOT: &str = "world";

/// Top-level world description
///
/// Objects and models stay raw YAML here; the
/// [`EntityBuilder`](crate::EntityBuilder) interprets them one at a time so
/// that one malformed object does not reject the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Directories searched for plugin libraries
    #[serde(default)]
    pub plugin_paths: Vec<PathBuf>,

    /// Directory holding `<type>.yaml` model files
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Inline models; each needs a `name`
    #[serde(default)]
    pub models: Vec<Value>,

    /// Objects placed under the world root
    #[serde(default)]
    pub objects: Vec<Value>,

    // Internal: path to the world file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl WorldConfig {
    /// Load a world description from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse a world description from YAML text
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = if yaml.trim().is_empty() {
            WorldConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, model) in self.models.iter().enumerate() {
            if model.get("name").and_then(Value::as_str).is_none() {
                return Err(ConfigError::MissingField(format!("models[{}].name", i)));
            }
        }
        Ok(())
    }

    /// Plugin search paths, resolved relative to the world file
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.plugin_paths.iter().map(|p| self.resolve_path(p)).collect()
    }

    /// Model directory, resolved relative to the world file
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.model_path.as_ref().map(|p| self.resolve_path(p))
    }

    /// Resolve a path relative to the world file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Settings for constructing a [`Simulator`](crate::Simulator) programmatically
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Identifier of the world root entity
    #[serde(default = "default_root")]
    pub root: String,

    /// Directories searched for plugin libraries
    #[serde(default)]
    pub plugin_paths: Vec<PathBuf>,
}

fn default_root() -> String {
    String::from(DEFAULT_ROOT)
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            plugin_paths: Vec::new(),
        }
    }
}
