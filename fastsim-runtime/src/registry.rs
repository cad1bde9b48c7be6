//! Plugin registry and library resolution
//!
//! Plugins are compiled into the binary and registered by key. A library
//! reference from a world file (`mover`, `libmover.so`, `/opt/sim/libmover.so`)
//! is resolved against the configured search paths and reduced to a registry
//! key, the same way a dynamic loader would locate a shared object and look
//! up its entry symbol.

use crate::error::LoadError;
use crate::plugin::Plugin;
use crate::plugins;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Named plugin constructors
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, Factory>,
}

impl PluginRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the plugins shipped with fastsim
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        plugins::register_builtins(&mut registry);
        registry
    }

    /// Register `factory` under `key`, replacing any previous registration
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn instantiate(&self, key: &str) -> Option<Box<dyn Plugin>> {
        self.factories.get(key).map(|factory| factory())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Resolves library references to plugin instances
#[derive(Debug, Clone, Default)]
pub struct PluginLoader {
    registry: PluginRegistry,
    search_paths: Vec<PathBuf>,
}

impl PluginLoader {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            search_paths: Vec::new(),
        }
    }

    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_paths.extend(paths);
        self
    }

    /// Append a directory to the search path list (later paths are searched last)
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// Locate a library file: absolute paths must exist, relative ones are
    /// tried against each search path in order
    pub fn locate(&self, library: &str) -> Option<PathBuf> {
        let path = Path::new(library);
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        self.search_paths
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
    }

    /// Reduce a library reference to the registry key it provides
    pub fn resolve(&self, library: &str) -> Result<String, LoadError> {
        if library.is_empty() {
            return Err(LoadError::EmptyLibrary);
        }

        // Bare plugin names need no file on disk
        if is_bare_name(library) && self.registry.contains(library) {
            return Ok(library.to_string());
        }

        let located = self.locate(library).ok_or_else(|| LoadError::LibraryNotFound {
            library: library.to_string(),
            searched: self.describe_search_paths(library),
        })?;

        let key = library_key(&located).ok_or_else(|| LoadError::MissingSymbol {
            library: located.display().to_string(),
            symbol: library.to_string(),
        })?;

        if !self.registry.contains(&key) {
            return Err(LoadError::MissingSymbol {
                library: located.display().to_string(),
                symbol: key,
            });
        }

        tracing::debug!(library, path = %located.display(), key = %key, "Resolved plugin library");
        Ok(key)
    }

    /// Resolve `library` and create a fresh plugin instance from it
    pub fn instantiate(&self, library: &str) -> Result<Box<dyn Plugin>, LoadError> {
        let key = self.resolve(library)?;
        self.registry
            .instantiate(&key)
            .ok_or_else(|| LoadError::MissingSymbol {
                library: library.to_string(),
                symbol: key,
            })
    }

    fn describe_search_paths(&self, library: &str) -> String {
        if Path::new(library).is_absolute() || self.search_paths.is_empty() {
            return "no search paths".to_string();
        }
        self.search_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn is_bare_name(library: &str) -> bool {
    !library.contains(['/', '\\', '.'])
}

/// Registry key of a library file: the file stem without a `lib` prefix
///
/// `/a/b/libmover.so` → `mover`, `pose_logger.dylib` → `pose_logger`.
pub fn library_key(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let key = stem.strip_prefix("lib").unwrap_or(stem);
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
