//! Entity builder: declarative object trees to one update request
//!
//! The builder walks the `objects` of a world file recursively and stages
//! every entity, shape and pose into a single [`UpdateRequest`], collecting
//! the plugins objects ask for as [`PluginSpec`]s. Nothing is visible to
//! snapshot readers until that request is applied as a whole.
//!
//! Problems with individual objects are collected as [`ConfigIssue`]s. The
//! offending object and everything nested in it are skipped; siblings are
//! still built.

use crate::config::{ConfigError, WorldConfig};
use crate::plugin::PluginConfig;
use crate::registry::library_key;
use fastsim_types::PoseConfig;
use fastsim_world::{Id, Pose3D, ShapeRef, Snapshot, Time, UpdateRequest, UNKNOWN_TYPE};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A problem found in one object of a world description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Location in the document, e.g. `objects[2].objects[0]`
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A plugin requested by an object, not yet loaded
#[derive(Debug, Clone)]
pub struct PluginSpec {
    /// Container name, `<object id>-<library key>` unless given explicitly
    pub name: String,
    pub library: String,
    pub entity: Id,
    pub period: Duration,
    pub config: PluginConfig,
    /// Location of the plugin entry in the document
    pub path: String,
}

/// Result of building an object tree
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub request: UpdateRequest,
    pub plugins: Vec<PluginSpec>,
    pub issues: Vec<ConfigIssue>,
}

/// Model definitions an object can inherit from through its `type`
///
/// Inline models are consulted first; otherwise `<model_dir>/<type>.yaml` is
/// read once and cached.
#[derive(Debug, Default)]
pub struct ModelLibrary {
    models: HashMap<String, Mapping>,
    model_dir: Option<PathBuf>,
    missing: HashSet<String>,
}

impl ModelLibrary {
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        Self {
            model_dir,
            ..Self::default()
        }
    }

    /// Library holding the inline models and model directory of a world file
    pub fn from_config(config: &WorldConfig) -> Self {
        let mut library = Self::new(config.model_dir());
        for model in &config.models {
            let name = model.get("name").and_then(Value::as_str);
            if let (Some(name), Some(data)) = (name, model.as_mapping()) {
                library.insert(name, data.clone());
            }
        }
        library
    }

    pub fn insert(&mut self, name: impl Into<String>, mut data: Mapping) {
        data.remove("name");
        self.models.insert(name.into(), data);
    }

    /// Model data for `entity_type`, `None` if no model of that name exists
    pub fn lookup(&mut self, entity_type: &str) -> Result<Option<&Mapping>, ConfigError> {
        if !self.models.contains_key(entity_type) && !self.missing.contains(entity_type) {
            match self.read_model_file(entity_type)? {
                Some(data) => self.insert(entity_type, data),
                None => {
                    self.missing.insert(entity_type.to_string());
                }
            }
        }
        Ok(self.models.get(entity_type))
    }

    fn read_model_file(&self, entity_type: &str) -> Result<Option<Mapping>, ConfigError> {
        let Some(dir) = &self.model_dir else {
            return Ok(None);
        };
        // Types are plain names; anything path-like cannot name a model file
        if entity_type.contains(['/', '\\']) || entity_type.starts_with('.') {
            return Ok(None);
        }

        let path = dir.join(format!("{}.yaml", entity_type));
        if !path.is_file() {
            return Ok(None);
        }

        tracing::debug!(model = entity_type, path = %path.display(), "Loading model file");
        let contents = std::fs::read_to_string(&path)?;
        let data: Mapping = serde_yaml::from_str(&contents)?;
        Ok(Some(data))
    }
}

#[derive(Debug, Deserialize)]
struct ObjectConfig {
    id: String,

    #[serde(rename = "type", default)]
    entity_type: Option<String>,

    #[serde(default)]
    parent: Option<String>,

    #[serde(default)]
    shape: Option<String>,

    #[serde(default)]
    pose: Option<PoseConfig>,

    #[serde(default)]
    properties: Mapping,

    #[serde(default)]
    plugins: Vec<Value>,

    #[serde(default)]
    objects: Vec<Value>,
}

/// An object that passed its own checks, waiting for its parent to resolve
#[derive(Debug)]
struct StagedObject {
    id: Id,
    parent: Id,
    entity_type: String,
    shape: Option<ShapeRef>,
    pose: Pose3D,
    plugins: Vec<PluginSpec>,
    path: String,
}

/// Turns object descriptions into one update request
#[derive(Debug)]
pub struct EntityBuilder<'a> {
    models: &'a mut ModelLibrary,
    base: &'a Snapshot,
    staged: Vec<StagedObject>,
    /// declared id -> index into `staged`
    declared: HashMap<Id, usize>,
    output: BuildOutput,
}

impl<'a> EntityBuilder<'a> {
    /// A builder staging changes against `base`
    pub fn new(models: &'a mut ModelLibrary, base: &'a Snapshot) -> Self {
        Self {
            models,
            base,
            staged: Vec::new(),
            declared: HashMap::new(),
            output: BuildOutput::default(),
        }
    }

    /// Build every object of `objects` under `parent`
    pub fn add_objects(&mut self, parent: &Id, objects: &[Value], path: &str) {
        for (i, object) in objects.iter().enumerate() {
            let item_path = if path.is_empty() {
                format!("objects[{}]", i)
            } else {
                format!("{}.objects[{}]", path, i)
            };
            self.add_object(parent, object, &item_path);
        }
    }

    /// Build one object and its nested children
    pub fn add_object(&mut self, parent: &Id, value: &Value, path: &str) {
        let Some(object) = value.as_mapping() else {
            self.issue(path, "object must be a mapping");
            return;
        };

        if is_disabled(object) {
            tracing::debug!(path, "Object disabled, skipping subtree");
            return;
        }

        let object = match self.with_model_defaults(object) {
            Ok(object) => object,
            Err(message) => {
                self.issue(path, message);
                return;
            }
        };

        let config: ObjectConfig = match serde_yaml::from_value(Value::Mapping(object)) {
            Ok(config) => config,
            Err(e) => {
                self.issue(path, format!("invalid object: {}", e));
                return;
            }
        };

        let Some(pose) = config.pose else {
            self.issue(path, format!("object '{}' is missing required field 'pose'", config.id));
            return;
        };

        let id = Id::new(&config.id);
        let parent = config.parent.as_deref().map(Id::new).unwrap_or_else(|| parent.clone());
        if let Err(message) = self.check_placement(&id, &parent) {
            self.issue(path, message);
            return;
        }

        let mut plugins = Vec::new();
        for (i, entry) in config.plugins.iter().enumerate() {
            let plugin_path = format!("{}.plugins[{}]", path, i);
            match plugin_spec(&id, entry, &config.properties, &plugin_path) {
                Ok(spec) => plugins.push(spec),
                Err(message) => self.issue(&plugin_path, message),
            }
        }

        self.declared.insert(id.clone(), self.staged.len());
        self.staged.push(StagedObject {
            id: id.clone(),
            parent,
            entity_type: config.entity_type.unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
            shape: config.shape.map(ShapeRef::new),
            pose: Pose3D::from(pose),
            plugins,
            path: path.to_string(),
        });

        self.add_objects(&id, &config.objects, path);
    }

    /// Whether `id` may be attached to `parent` given everything declared so far
    fn check_placement(&self, id: &Id, parent: &Id) -> Result<(), String> {
        if id.as_str().starts_with(Id::ALLOCATED_PREFIX) {
            return Err(format!(
                "object id '{}' uses the reserved prefix '{}'",
                id,
                Id::ALLOCATED_PREFIX
            ));
        }
        if id == self.base.root() {
            return Err(format!("object id '{}' is the world root", id));
        }
        if self.declared.contains_key(id) {
            return Err(format!("object '{}' is declared more than once", id));
        }
        if id == parent {
            return Err(format!("object '{}' cannot be its own parent", id));
        }
        if let Some(existing) = self.base.parent(id) {
            if existing != parent {
                return Err(format!("object '{}' is already attached to '{}'", id, existing));
            }
        }

        // Parents named through `parent:` can close a loop with earlier objects
        let mut current = parent;
        for _ in 0..=self.staged.len() + self.base.len() {
            if current == id {
                return Err(format!("attaching '{}' to '{}' would create a cycle", id, parent));
            }
            let next = match self.declared.get(current) {
                Some(&i) => Some(&self.staged[i].parent),
                None => self.base.parent(current),
            };
            match next {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Stage every object whose parent exists and report those whose parent never appeared
    ///
    /// An object attached to a missing parent is dropped together with
    /// everything below it.
    pub fn finish(mut self) -> BuildOutput {
        let staged = std::mem::take(&mut self.staged);
        let mut placed = vec![false; staged.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (i, object) in staged.iter().enumerate() {
                if placed[i] {
                    continue;
                }
                let resolved = match self.declared.get(&object.parent) {
                    Some(&j) => placed[j],
                    None => self.base.contains(&object.parent),
                };
                if resolved {
                    placed[i] = true;
                    changed = true;
                }
            }
        }

        for (object, placed) in staged.into_iter().zip(placed) {
            if !placed {
                if !self.declared.contains_key(&object.parent) {
                    self.issue(
                        &object.path,
                        format!("parent '{}' of object '{}' does not exist", object.parent, object.id),
                    );
                }
                continue;
            }

            let request = &mut self.output.request;
            request.set_type(object.id.clone(), object.entity_type);
            request.set_pose(object.parent, object.id.clone(), object.pose, Time::ZERO);
            if let Some(shape) = object.shape {
                request.set_shape(object.id, shape);
            }
            self.output.plugins.extend(object.plugins);
        }

        self.output
    }

    /// The object's own keys, completed with those of the model its `type` names
    fn with_model_defaults(&mut self, object: &Mapping) -> Result<Mapping, String> {
        let mut merged = object.clone();
        let Some(entity_type) = object.get("type").and_then(Value::as_str) else {
            return Ok(merged);
        };

        let model = self
            .models
            .lookup(entity_type)
            .map_err(|e| format!("while loading model '{}': {}", entity_type, e))?;

        if let Some(model) = model {
            for (key, value) in model {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(merged)
    }

    fn issue(&mut self, path: &str, message: impl Into<String>) {
        let issue = ConfigIssue::new(path, message);
        tracing::warn!(path = %issue.path, "{}", issue.message);
        self.output.issues.push(issue);
    }
}

/// Build the objects of a world file under `root`
pub fn build_world(models: &mut ModelLibrary, base: &Snapshot, objects: &[Value]) -> BuildOutput {
    let root = base.root().clone();
    let mut builder = EntityBuilder::new(models, base);
    builder.add_objects(&root, objects, "");
    builder.finish()
}

fn is_disabled(object: &Mapping) -> bool {
    match object.get("enabled") {
        Some(Value::Bool(enabled)) => !enabled,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn plugin_spec(entity: &Id, entry: &Value, properties: &Mapping, path: &str) -> Result<PluginSpec, String> {
    let Some(entry) = entry.as_mapping() else {
        return Err("plugin entry must be a mapping".to_string());
    };

    let mut settings = entry.clone();
    let library = match settings.remove("lib") {
        Some(Value::String(lib)) => lib,
        Some(_) => return Err("'lib' must be a string".to_string()),
        None => return Err("plugin entry is missing required field 'lib'".to_string()),
    };

    let name = match settings.remove("name") {
        Some(Value::String(name)) => name,
        Some(_) => return Err("'name' must be a string".to_string()),
        None => {
            let key = library_key(std::path::Path::new(&library)).unwrap_or_else(|| library.clone());
            format!("{}-{}", entity, key)
        }
    };

    let period = match settings.remove("frequency") {
        None => Duration::ZERO,
        Some(value) => match value.as_f64() {
            Some(hz) if hz == 0.0 => Duration::ZERO,
            Some(hz) if hz > 0.0 => Duration::try_from_secs_f64(1.0 / hz)
                .map_err(|e| format!("invalid frequency {}: {}", hz, e))?,
            _ => return Err(format!("invalid frequency {:?}", value)),
        },
    };

    let mut config = PluginConfig::from_mapping(settings);
    config.merge_defaults(properties);

    Ok(PluginSpec {
        name,
        library,
        entity: entity.clone(),
        period,
        config,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastsim_world::EntityOp;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn objects(yaml: &str) -> Vec<Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn world() -> Arc<Snapshot> {
        Snapshot::with_root(Id::new("world"))
    }

    fn build(yaml: &str) -> (Arc<Snapshot>, BuildOutput) {
        let base = world();
        let mut models = ModelLibrary::default();
        let output = build_world(&mut models, &base, &objects(yaml));
        (base, output)
    }

    #[test]
    fn test_nested_objects() {
        let (base, output) = build(
            r#"
- id: table
  type: table
  pose: {x: 2}
  objects:
    - id: cup
      pose: {z: 0.8}
"#,
        );
        assert!(output.issues.is_empty());

        let next = base.apply(&output.request).unwrap();
        assert_eq!(next.parent(&Id::new("cup")), Some(&Id::new("table")));
        assert_eq!(next.object(&Id::new("cup")).unwrap().entity_type, UNKNOWN_TYPE);
        let cup = next.transform(&Id::new("cup"), &Id::new("world")).unwrap();
        assert!(cup.approx_eq(&Pose3D::from_translation(2.0, 0.0, 0.8), 1e-9));
    }

    #[test]
    fn test_disabled_subtree_is_omitted() {
        let (base, output) = build(
            r#"
- id: shelf
  enabled: false
  pose: {x: 1}
  objects:
    - id: book
      pose: {}
- id: lamp
  enabled: true
  pose: {y: 1}
"#,
        );
        assert!(output.issues.is_empty());

        let next = base.apply(&output.request).unwrap();
        assert!(!next.contains(&Id::new("shelf")));
        assert!(!next.contains(&Id::new("book")));
        assert!(next.contains(&Id::new("lamp")));
    }

    #[test]
    fn test_bad_object_skipped_siblings_kept() {
        let (base, output) = build(
            r#"
- id: nopose
- pose: {x: 1}
- id: fine
  pose: {x: 1}
"#,
        );
        assert_eq!(output.issues.len(), 2);
        assert_eq!(output.issues[0].path, "objects[0]");
        assert!(output.issues[0].message.contains("pose"));
        assert_eq!(output.issues[1].path, "objects[1]");

        let next = base.apply(&output.request).unwrap();
        assert!(next.contains(&Id::new("fine")));
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_inline_model_defaults() {
        let base = world();
        let mut models = ModelLibrary::default();
        models.insert(
            "table",
            serde_yaml::from_str("{name: table, shape: meshes/table.obj, pose: {z: 5}}").unwrap(),
        );

        let output = build_world(
            &mut models,
            &base,
            &objects("[{id: t1, type: table, pose: {x: 1}}]"),
        );
        assert!(output.issues.is_empty());

        let next = base.apply(&output.request).unwrap();
        let t1 = next.object(&Id::new("t1")).unwrap();
        assert_eq!(t1.shape.as_ref().map(ShapeRef::as_str), Some("meshes/table.obj"));
        // The object's own pose wins over the model's
        let pose = next.transform(&Id::new("t1"), &Id::new("world")).unwrap();
        assert!(pose.approx_eq(&Pose3D::from_translation(1.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_model_files_are_cached() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("crate.yaml"), "shape: crate.obj\n").unwrap();

        let mut models = ModelLibrary::new(Some(dir.path().to_path_buf()));
        assert!(models.lookup("crate").unwrap().is_some());

        std::fs::remove_file(dir.path().join("crate.yaml")).unwrap();
        assert!(models.lookup("crate").unwrap().is_some());
        assert!(models.lookup("barrel").unwrap().is_none());
    }

    #[test]
    fn test_broken_model_file_is_an_issue() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "[not a mapping").unwrap();

        let base = world();
        let mut models = ModelLibrary::new(Some(dir.path().to_path_buf()));
        let output = build_world(&mut models, &base, &objects("[{id: b, type: broken, pose: {}}]"));

        assert_eq!(output.issues.len(), 1);
        assert!(output.issues[0].message.contains("broken"));
        assert!(output.request.is_empty());
    }

    #[test]
    fn test_plugin_specs() {
        let (_, output) = build(
            r#"
- id: robot
  pose: {}
  properties: {speed: 1.5, color: red}
  plugins:
    - lib: /opt/sim/libmover.so
      frequency: 20
      speed: 3.0
    - lib: pose_logger
      name: logger
"#,
        );
        assert!(output.issues.is_empty());
        assert_eq!(output.plugins.len(), 2);

        let mover = &output.plugins[0];
        assert_eq!(mover.name, "robot-mover");
        assert_eq!(mover.period, Duration::from_millis(50));
        assert_eq!(mover.config.get::<f64>("speed").unwrap(), Some(3.0));
        assert_eq!(mover.config.get::<String>("color").unwrap().as_deref(), Some("red"));
        assert!(!mover.config.contains("lib"));

        let logger = &output.plugins[1];
        assert_eq!(logger.name, "logger");
        assert_eq!(logger.period, Duration::ZERO);

        // Bindings are recorded by whoever loads the plugins
        assert!(!output
            .request
            .entity_ops()
            .iter()
            .any(|op| matches!(op, EntityOp::BindPlugin { .. })));
    }

    #[test]
    fn test_plugin_without_lib() {
        let (_, output) = build("[{id: r, pose: {}, plugins: [{frequency: 10}]}]");
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].path, "objects[0].plugins[0]");
        assert!(output.plugins.is_empty());
    }

    #[test]
    fn test_parent_override() {
        let (base, output) = build(
            r#"
- id: cup
  parent: table
  pose: {z: 1}
- id: table
  type: table
  pose: {x: 3}
"#,
        );
        let next = base.apply(&output.request).unwrap();
        assert_eq!(next.parent(&Id::new("cup")), Some(&Id::new("table")));
        // The parent is declared after its child and still resolves
        assert!(output.issues.is_empty());
        assert_eq!(next.object(&Id::new("table")).unwrap().entity_type, "table");
    }

    #[test]
    fn test_parent_override_keeps_existing_type() {
        let base = world();
        let mut req = UpdateRequest::new();
        req.set_type("table", "table")
            .set_pose("world", "table", Pose3D::identity(), Time::ZERO);
        let base = base.apply(&req).unwrap();

        let mut models = ModelLibrary::default();
        let output = build_world(&mut models, &base, &objects("[{id: cup, parent: table, pose: {}}]"));
        let next = base.apply(&output.request).unwrap();
        assert_eq!(next.object(&Id::new("table")).unwrap().entity_type, "table");
    }

    #[test]
    fn test_duplicate_id_skipped_siblings_kept() {
        let (base, output) = build(
            r#"
- id: a
  pose: {}
- id: sibling
  pose: {}
- id: b
  pose: {}
  objects:
    - id: a
      pose: {x: 1}
"#,
        );
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].path, "objects[2].objects[0]");
        assert!(output.issues[0].message.contains("more than once"));

        let next = base.apply(&output.request).unwrap();
        assert!(next.contains(&Id::new("sibling")));
        assert_eq!(next.parent(&Id::new("a")), Some(&Id::new("world")));
        assert_eq!(next.parent(&Id::new("b")), Some(&Id::new("world")));
    }

    #[test]
    fn test_invalid_ids_are_issues() {
        let (base, output) = build(
            r#"
- id: world
  pose: {}
- id: _id7
  pose: {}
- id: loop
  parent: loop
  pose: {}
- id: fine
  pose: {}
"#,
        );
        let paths: Vec<&str> = output.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["objects[0]", "objects[1]", "objects[2]"]);
        assert!(output.issues[1].message.contains(Id::ALLOCATED_PREFIX));

        let next = base.apply(&output.request).unwrap();
        assert_eq!(next.len(), 2);
        assert!(next.contains(&Id::new("fine")));
    }

    #[test]
    fn test_conflicting_parent_in_base() {
        let base = world();
        let mut req = UpdateRequest::new();
        req.set_type("table", "table")
            .set_type("shelf", "shelf")
            .set_pose("world", "table", Pose3D::identity(), Time::ZERO)
            .set_pose("world", "shelf", Pose3D::identity(), Time::ZERO);
        let base = base.apply(&req).unwrap();

        let mut models = ModelLibrary::default();
        let output = build_world(
            &mut models,
            &base,
            &objects("[{id: table, parent: shelf, pose: {}}, {id: lamp, pose: {}}]"),
        );
        assert_eq!(output.issues.len(), 1);
        assert!(output.issues[0].message.contains("already attached"));

        let next = base.apply(&output.request).unwrap();
        assert_eq!(next.parent(&Id::new("table")), Some(&Id::new("world")));
        assert!(next.contains(&Id::new("lamp")));
    }

    #[test]
    fn test_unresolved_parent_drops_subtree() {
        let (base, output) = build(
            r#"
- id: cup
  parent: tabel
  pose: {z: 1}
  objects:
    - id: spoon
      pose: {}
- id: table
  pose: {}
"#,
        );
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].path, "objects[0]");
        assert!(output.issues[0].message.contains("tabel"));

        let next = base.apply(&output.request).unwrap();
        assert!(!next.contains(&Id::new("tabel")));
        assert!(!next.contains(&Id::new("cup")));
        assert!(!next.contains(&Id::new("spoon")));
        assert!(next.contains(&Id::new("table")));
    }

    #[test]
    fn test_parent_cycle_is_an_issue() {
        let (base, output) = build(
            r#"
- id: x
  parent: y
  pose: {}
- id: y
  parent: x
  pose: {}
- id: z
  pose: {}
"#,
        );
        let messages: Vec<&str> = output.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages.len(), 2, "{:?}", messages);
        assert!(messages[0].contains("cycle"));
        // x waited for y, which was never placed
        assert_eq!(output.issues[1].path, "objects[0]");

        let next = base.apply(&output.request).unwrap();
        assert_eq!(next.len(), 2);
        assert!(next.contains(&Id::new("z")));
    }

    #[test]
    fn test_tiny_frequency_is_an_issue() {
        let (_, output) = build("[{id: r, pose: {}, plugins: [{lib: mover, frequency: 1.0e-300}]}]");
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].path, "objects[0].plugins[0]");
        assert!(output.issues[0].message.contains("frequency"));
        assert!(output.plugins.is_empty());
    }
}
