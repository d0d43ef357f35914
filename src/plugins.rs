//! Plugin metadata, load order and cascading enable/disable.

use crate::dependency::{DependencyGraph, TopologicalSort};
use crate::error::{Error, Result};
use crate::settings::SettingsStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use toml::Value;

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ids of the plugins that must be loaded first.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub enabled_by_default: bool,
}

impl PluginSpec {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            dependencies: BTreeSet::new(),
            enabled_by_default: false,
        }
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }
}

/// A plugin list as written on disk:
///
/// ```toml
/// [[plugin]]
/// id = "websearch"
/// dependencies = ["python"]
/// ```
#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default, rename = "plugin")]
    plugins: Vec<PluginSpec>,
}

fn enabled_key(id: &str) -> String {
    format!("{id}.enabled")
}

/// Registered plugins with their resolved load order.
///
/// Plugins whose dependencies cannot be resolved (cycles, unknown ids) are
/// kept out of the load order and reported by [`unresolved`](Self::unresolved).
/// Enabled flags are persisted through the [`SettingsStore`].
pub struct PluginRegistry {
    settings: Arc<dyn SettingsStore>,
    specs: BTreeMap<String, PluginSpec>,
    graph: DependencyGraph<String>,
    load_order: Vec<String>,
    unresolved: BTreeMap<String, BTreeSet<String>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("load_order", &self.load_order)
            .field("unresolved", &self.unresolved)
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            specs: BTreeMap::new(),
            graph: DependencyGraph::default(),
            load_order: Vec::new(),
            unresolved: BTreeMap::new(),
        }
    }

    /// Registers every plugin listed in a TOML manifest.
    pub fn load_manifest(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let manifest: Manifest = toml::from_str(&text)?;
        tracing::debug!(
            "Read {} plugin specs from {}",
            manifest.plugins.len(),
            path.display()
        );
        self.register_all(manifest.plugins)
    }

    pub fn register(&mut self, spec: PluginSpec) -> Result<()> {
        self.register_all([spec])
    }

    /// Registers several plugins and resolves the load order once.
    ///
    /// Either all plugins are registered or, if any id is taken or repeated,
    /// none is.
    pub fn register_all(&mut self, specs: impl IntoIterator<Item = PluginSpec>) -> Result<()> {
        let specs: Vec<PluginSpec> = specs.into_iter().collect();
        let mut seen = BTreeSet::new();
        for spec in &specs {
            if self.specs.contains_key(&spec.id) || !seen.insert(spec.id.as_str()) {
                return Err(Error::DuplicateExtension(spec.id.clone()));
            }
        }
        for spec in specs {
            self.specs.insert(spec.id.clone(), spec);
        }
        self.resolve();
        Ok(())
    }

    fn resolve(&mut self) {
        let graph: BTreeMap<String, BTreeSet<String>> = self
            .specs
            .values()
            .map(|spec| (spec.id.clone(), spec.dependencies.clone()))
            .collect();
        self.graph = DependencyGraph::new(graph);

        let TopologicalSort { sorted, error_set } = self.graph.sort();
        for (id, dependencies) in &error_set {
            let dependencies: Vec<&str> = dependencies.iter().map(String::as_str).collect();
            tracing::warn!(
                "Plugin '{}' has cyclic or missing dependencies: {}",
                id,
                dependencies.join(", ")
            );
        }
        self.load_order = sorted;
        self.unresolved = error_set;
    }

    pub fn get(&self, id: &str) -> Option<&PluginSpec> {
        self.specs.get(id)
    }

    /// Resolvable plugins, each after its dependencies.
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Unresolvable plugins mapped to their declared dependencies.
    pub const fn unresolved(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.unresolved
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        let Some(spec) = self.specs.get(id) else {
            return false;
        };
        !self.unresolved.contains_key(id)
            && self
                .settings
                .get_bool(&enabled_key(id))
                .unwrap_or(spec.enabled_by_default)
    }

    /// Enabled plugins in load order.
    pub fn enabled(&self) -> Vec<&str> {
        self.load_order
            .iter()
            .filter(|id| self.is_enabled(id))
            .map(String::as_str)
            .collect()
    }

    /// Enables `id` and every disabled plugin it depends on.
    ///
    /// Returns the plugins that changed state, in load order.
    pub fn enable(&mut self, id: &str) -> Result<Vec<String>> {
        let position = self.position(id)?;
        let mut cascade = self.graph.transitive_dependencies(&id.to_string());
        cascade.insert(id.to_string());

        let changed = self.in_load_order(&cascade, |registry, p| !registry.is_enabled(p));
        for plugin in &changed {
            self.settings.set(&enabled_key(plugin), Value::from(true))?;
        }
        if changed.len() > 1 {
            tracing::info!(
                "Enabling '{}' (load position {}) also enabled {:?}",
                id,
                position,
                &changed[..changed.len() - 1]
            );
        }
        Ok(changed)
    }

    /// Disables `id` and every enabled plugin depending on it.
    ///
    /// Returns the plugins that changed state, dependents first.
    pub fn disable(&mut self, id: &str) -> Result<Vec<String>> {
        self.position(id)?;
        let mut cascade = self.graph.transitive_dependents(&id.to_string());
        cascade.insert(id.to_string());

        let mut changed = self.in_load_order(&cascade, |registry, p| registry.is_enabled(p));
        changed.reverse();
        for plugin in &changed {
            self.settings.set(&enabled_key(plugin), Value::from(false))?;
        }
        if changed.len() > 1 {
            tracing::info!("Disabling '{}' also disabled {:?}", id, &changed[..changed.len() - 1]);
        }
        Ok(changed)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.load_order
            .iter()
            .position(|p| p == id)
            .ok_or_else(|| Error::UnknownPlugin(id.to_string()))
    }

    fn in_load_order(
        &self,
        set: &BTreeSet<String>,
        include: impl Fn(&Self, &str) -> bool,
    ) -> Vec<String> {
        self.load_order
            .iter()
            .filter(|p| set.contains(*p) && include(self, p))
            .cloned()
            .collect()
    }
}
