//! Plugin lifecycle: load, register, execute, initialize, unload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{RuleExecutionContext, RuleOutcome};
use crate::error::{SupervisorError, SupervisorResult};
use crate::metrics::METRICS;
use crate::obs;

use super::contract::{PluginInfo, PluginLoader, RulePlugin};
use super::manifest::ManifestPluginLoader;
use super::registry::PluginRegistry;

/// A plugin file that could not be loaded during a directory scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginLoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of [`PluginManager::load_plugins_from_directory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryLoadReport {
    pub loaded: Vec<PluginInfo>,
    pub failures: Vec<PluginLoadFailure>,
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Owns the [`PluginRegistry`] and the loader used to materialize plugins
/// from disk.
pub struct PluginManager {
    registry: PluginRegistry,
    loader: Arc<dyn PluginLoader>,
    /// Held from the duplicate check through `init` to registration.
    registering: Mutex<()>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// A manager backed by the manifest loader.
    pub fn new() -> Self {
        Self::with_loader(Arc::new(ManifestPluginLoader::default()))
    }

    pub fn with_loader(loader: Arc<dyn PluginLoader>) -> Self {
        Self {
            registry: PluginRegistry::new(),
            loader,
            registering: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Initialize and register an in-process plugin.
    ///
    /// A name collision is rejected before `init` runs. Concurrent
    /// registrations are serialized, so two loads of the same name never
    /// both run `init`.
    pub async fn register_plugin(&self, plugin: Arc<dyn RulePlugin>) -> SupervisorResult<PluginInfo> {
        let info = PluginInfo::of(plugin.as_ref());
        let _guard = self.registering.lock().await;
        if self.registry.has(&info.name) {
            return Err(SupervisorError::plugin(
                &info.name,
                "plugin is already registered",
            ));
        }

        plugin.init().await?;
        if let Err(e) = self.registry.register(Arc::clone(&plugin)) {
            // Inserted directly through `registry()` while `init` ran.
            if let Err(cleanup) = plugin.cleanup().await {
                warn!(plugin = %info.name, error = %cleanup, "cleanup after rejected registration failed");
            }
            return Err(e);
        }

        METRICS.inc_plugins_loaded();
        obs::emit_plugin_loaded(&info.name, &info.version);
        Ok(info)
    }

    /// Load a single plugin file and register it.
    ///
    /// Every failure is reported as [`SupervisorError::PluginLoad`] naming
    /// the absolute path, with the underlying error as its source.
    pub async fn load_plugin(&self, path: impl AsRef<Path>) -> SupervisorResult<PluginInfo> {
        let path = absolute(path.as_ref());
        self.load_resolved(&path)
            .await
            .map_err(|source| SupervisorError::PluginLoad {
                path,
                source: Box::new(source),
            })
    }

    async fn load_resolved(&self, path: &Path) -> SupervisorResult<PluginInfo> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(SupervisorError::plugin(
                path.display().to_string(),
                "not a regular file",
            ));
        }
        if !self.loader.supports(path) {
            return Err(SupervisorError::plugin(
                path.display().to_string(),
                "unsupported plugin file extension",
            ));
        }

        let plugin = self.loader.load(path).await?;
        self.register_plugin(plugin).await
    }

    /// Load every supported file in `dir`, in file-name order.
    ///
    /// Individual failures are collected in the report. The call fails only
    /// when the directory cannot be read or every candidate failed.
    pub async fn load_plugins_from_directory(
        &self,
        dir: impl AsRef<Path>,
    ) -> SupervisorResult<DirectoryLoadReport> {
        let dir = absolute(dir.as_ref());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                return Err(SupervisorError::PluginLoad {
                    path: dir,
                    source: Box::new(e.into()),
                })
            }
        };

        let mut candidates = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(SupervisorError::PluginLoad {
                        path: dir,
                        source: Box::new(e.into()),
                    })
                }
            };
            let path = entry.path();
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file && self.loader.supports(&path) {
                candidates.push(path);
            } else {
                debug!(path = %path.display(), "skipping non-plugin entry");
            }
        }
        candidates.sort();

        let mut report = DirectoryLoadReport::default();
        for path in candidates {
            match self.load_plugin(&path).await {
                Ok(info) => report.loaded.push(info),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "plugin failed to load");
                    report.failures.push(PluginLoadFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.loaded.is_empty() && !report.failures.is_empty() {
            let detail = report
                .failures
                .iter()
                .map(|f| f.error.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SupervisorError::PluginLoad {
                source: Box::new(SupervisorError::plugin(
                    dir.display().to_string(),
                    format!("all {} plugin(s) failed to load: {detail}", report.failures.len()),
                )),
                path: dir,
            });
        }
        Ok(report)
    }

    /// Run the plugin's `cleanup` hook and remove it from the registry.
    ///
    /// A failing `cleanup` leaves the plugin registered.
    pub async fn unload_plugin(&self, name: &str) -> SupervisorResult<()> {
        let plugin = self
            .registry
            .get(name)
            .ok_or_else(|| SupervisorError::PluginNotFound(name.to_string()))?;
        plugin.cleanup().await?;
        self.registry.unregister(name);
        debug!(plugin = %name, "plugin unloaded");
        Ok(())
    }

    /// Validate `config` with the plugin, then execute it.
    pub async fn execute_plugin(
        &self,
        name: &str,
        input: &RuleExecutionContext,
        config: &Value,
    ) -> SupervisorResult<RuleOutcome> {
        let plugin = self
            .registry
            .get(name)
            .ok_or_else(|| SupervisorError::PluginNotFound(name.to_string()))?;

        if !plugin.validate(config).await? {
            return Err(SupervisorError::plugin(
                name,
                "plugin rejected its configuration",
            ));
        }
        plugin.execute(input, config).await
    }

    /// Run `init` on every registered plugin.
    ///
    /// All plugins are attempted; failures are aggregated into one error.
    pub async fn initialize_plugins(&self) -> SupervisorResult<()> {
        let mut failures = Vec::new();
        for plugin in self.registry.list() {
            if let Err(e) = plugin.init().await {
                failures.push(format!("{}: {e}", plugin.name()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SupervisorError::PluginInitialization { failures })
        }
    }

    /// Run `cleanup` on every plugin, then clear the registry.
    ///
    /// Cleanup failures are logged and never abort the sweep.
    pub async fn cleanup_plugins(&self) {
        for plugin in self.registry.list() {
            if let Err(e) = plugin.cleanup().await {
                warn!(plugin = %plugin.name(), error = %e, "plugin cleanup failed");
            }
        }
        self.registry.clear();
    }

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.registry
            .list()
            .iter()
            .map(|p| PluginInfo::of(p.as_ref()))
            .collect()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.registry.has(name)
    }

    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn RulePlugin>> {
        self.registry.get(name)
    }
}
