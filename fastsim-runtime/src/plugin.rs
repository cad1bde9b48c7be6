//! The plugin interface and plugin configuration

use anyhow::Context;
use fastsim_world::{ApplyError, Id, Snapshot, UpdateRequest};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// A behavior module run by a [`PluginContainer`](crate::PluginContainer)
///
/// Plugins are instantiated by the [`PluginRegistry`](crate::PluginRegistry),
/// configured once, and then driven from their container's thread. All state
/// a plugin keeps is private to that thread.
pub trait Plugin: Send {
    /// Short type name used in logs
    fn name(&self) -> &str;

    /// Apply the plugin configuration; an error prevents the container from loading
    fn configure(&mut self, _config: &PluginConfig, _entity: Option<&Id>) -> anyhow::Result<()> {
        Ok(())
    }

    /// One processing tick
    ///
    /// `world` is the most recent snapshot published to this container and
    /// `dt` the wall-clock time in seconds since the previous tick. Proposed
    /// mutations go into `request`; leaving it empty stages nothing.
    fn process(&mut self, world: &Snapshot, entity: Option<&Id>, dt: f64, request: &mut UpdateRequest);

    /// Called on the plugin's own thread when a request it staged was rejected
    fn on_rejected(&mut self, error: &ApplyError) {
        tracing::warn!(plugin = self.name(), %error, "Update request rejected");
    }
}

/// Free-form key/value configuration handed to [`Plugin::configure`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginConfig {
    values: Mapping,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(values: Mapping) -> Self {
        Self { values }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(Value::from(key), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed value of `key`, `None` if absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.values.get(key) {
            Some(value) => serde_yaml::from_value(value.clone())
                .with_context(|| format!("invalid value for '{}'", key))
                .map(Some),
            None => Ok(None),
        }
    }

    /// Typed value of `key`, which must be present
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<T> {
        self.get(key)?
            .with_context(|| format!("missing required field '{}'", key))
    }

    /// Deserialize the whole configuration into a plugin-specific struct
    pub fn deserialize<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_yaml::from_value(Value::Mapping(self.values.clone()))
            .context("invalid plugin configuration")
    }

    /// Add every key of `defaults` that this configuration does not set itself
    pub fn merge_defaults(&mut self, defaults: &Mapping) {
        for (key, value) in defaults {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.values
    }
}
