use figment::Figment;
use figment::providers::{Format, Json, Yaml};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Capability, CapabilityKind, Plugin, PluginCatalog, PluginConfig, PluginError};

/// Outcome of a bulk load: registered names and skipped entries with the reason.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<(String, PluginError)>,
}

/// Owns every plugin instance, keyed by unique name, in registration order.
pub struct PluginManager {
    plugins: RwLock<Vec<(String, Arc<dyn Plugin>)>>,
}

impl PluginManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Register under the plugin's self-reported name.
    ///
    /// # Errors
    /// Returns [`PluginError::AlreadyRegistered`] if the name is taken.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_owned();
        self.register_named(name, plugin)
    }

    /// Register under an explicit name.
    ///
    /// # Errors
    /// Returns [`PluginError::AlreadyRegistered`] if the name is taken.
    pub fn register_named(
        &self,
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
    ) -> Result<(), PluginError> {
        let name = name.into();
        let mut plugins = self.plugins.write();
        if plugins.iter().any(|(n, _)| *n == name) {
            return Err(PluginError::AlreadyRegistered { name });
        }
        let caps: Vec<&str> = CapabilityKind::of(&plugin)
            .into_iter()
            .map(CapabilityKind::as_str)
            .collect();
        tracing::info!(plugin = %name, capabilities = ?caps, "Plugin registered");
        plugins.push((name, plugin));
        Ok(())
    }

    /// # Errors
    /// Returns [`PluginError::NotFound`] for unknown names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.plugins
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| Arc::clone(p))
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Capability view of a named plugin; `Ok(None)` when it lacks the capability.
    ///
    /// # Errors
    /// Returns [`PluginError::NotFound`] for unknown names.
    pub fn get_as<C>(&self, name: &str) -> Result<Option<Arc<C>>, PluginError>
    where
        C: ?Sized + Capability,
    {
        self.get(name).map(C::view)
    }

    /// All plugins offering capability `C`, in registration order.
    #[must_use]
    pub fn with_capability<C>(&self) -> Vec<(String, Arc<C>)>
    where
        C: ?Sized + Capability,
    {
        self.snapshot()
            .into_iter()
            .filter_map(|(name, plugin)| C::view(plugin).map(|view| (name, view)))
            .collect()
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.plugins.read().iter().map(|(n, _)| n.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        self.plugins.read().clone()
    }

    /// Instantiate, initialize and register one configured plugin.
    ///
    /// # Errors
    /// Unknown kind, initialization failure or a duplicate name.
    pub async fn load(
        &self,
        catalog: &PluginCatalog,
        config: &PluginConfig,
    ) -> Result<(), PluginError> {
        let factory = catalog
            .get(config.kind())
            .ok_or_else(|| PluginError::UnknownKind {
                kind: config.kind().to_owned(),
            })?;

        if self.plugins.read().iter().any(|(n, _)| *n == config.name) {
            return Err(PluginError::AlreadyRegistered {
                name: config.name.clone(),
            });
        }

        let plugin = (factory.construct)();
        plugin.initialize(&config.config).await?;
        tracing::debug!(
            plugin = %config.name,
            kind = factory.kind,
            reported_name = plugin.name(),
            "Plugin initialized"
        );
        if let Err(e) = self.register_named(config.name.clone(), plugin.clone()) {
            if let Err(shutdown_err) = plugin.shutdown().await {
                tracing::warn!(plugin = %config.name, error = %shutdown_err, "Failed to shut down unregistered plugin");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Load every enabled entry. Failures are logged and skipped.
    pub async fn load_from_configs(
        &self,
        catalog: &PluginCatalog,
        configs: &[PluginConfig],
    ) -> LoadReport {
        let mut report = LoadReport::default();
        for config in configs {
            if !config.enabled {
                tracing::debug!(plugin = %config.name, "Plugin disabled, skipping");
                continue;
            }
            match self.load(catalog, config).await {
                Ok(()) => report.loaded.push(config.name.clone()),
                Err(e) => {
                    tracing::warn!(plugin = %config.name, error = %e, "Failed to load plugin, skipping");
                    report.skipped.push((config.name.clone(), e));
                }
            }
        }
        report
    }

    /// Load plugin manifests (`*.yaml`, `*.yml`, `*.json`) from `dir`, in file-name order.
    ///
    /// Each manifest holds one [`PluginConfig`]. Unreadable manifests are logged and skipped.
    ///
    /// # Errors
    /// Returns an error only if the directory itself cannot be read.
    pub async fn load_from_dir(
        &self,
        catalog: &PluginCatalog,
        dir: &Path,
    ) -> Result<LoadReport, PluginError> {
        let scan_dir = dir.to_path_buf();
        let (configs, skipped) = tokio::task::spawn_blocking(move || read_manifest_dir(&scan_dir))
            .await
            .map_err(|e| PluginError::Manifest {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })??;

        let loaded = self.load_from_configs(catalog, &configs).await;
        let mut report = LoadReport {
            loaded: loaded.loaded,
            skipped,
        };
        report.skipped.extend(loaded.skipped);
        Ok(report)
    }

    /// Shut down every plugin in reverse registration order.
    ///
    /// # Errors
    /// Returns the last shutdown error; all plugins are attempted regardless.
    pub async fn shutdown_all(&self) -> Result<(), PluginError> {
        let mut last_err = None;
        for (name, plugin) in self.snapshot().into_iter().rev() {
            if let Err(e) = plugin.shutdown().await {
                tracing::warn!(plugin = %name, error = %e, "Failed to shut down plugin");
                last_err = Some(e);
            } else {
                tracing::debug!(plugin = %name, "Plugin shut down");
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

enum ManifestFormat {
    Yaml,
    Json,
}

fn manifest_format(path: &Path) -> Option<ManifestFormat> {
    match path.extension()?.to_str()? {
        "yaml" | "yml" => Some(ManifestFormat::Yaml),
        "json" => Some(ManifestFormat::Json),
        _ => None,
    }
}

type ManifestScan = (Vec<PluginConfig>, Vec<(String, PluginError)>);

/// Blocking scan of a manifest directory: parsed configs plus the manifests that failed.
fn read_manifest_dir(dir: &Path) -> Result<ManifestScan, PluginError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PluginError::Manifest {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut manifests: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && manifest_format(path).is_some())
        .collect();
    manifests.sort();

    let mut configs = Vec::with_capacity(manifests.len());
    let mut skipped = Vec::new();
    for path in manifests {
        match read_manifest(&path) {
            Ok(config) => configs.push(config),
            Err(e) => {
                tracing::warn!(manifest = %path.display(), error = %e, "Invalid plugin manifest, skipping");
                skipped.push((path.display().to_string(), e));
            }
        }
    }
    Ok((configs, skipped))
}

fn read_manifest(path: &Path) -> Result<PluginConfig, PluginError> {
    let figment = match manifest_format(path) {
        Some(ManifestFormat::Yaml) => Figment::from(Yaml::file_exact(path)),
        Some(ManifestFormat::Json) => Figment::from(Json::file_exact(path)),
        None => {
            return Err(PluginError::Manifest {
                path: path.to_path_buf(),
                reason: "unsupported manifest extension".to_owned(),
            });
        }
    };
    figment.extract().map_err(|e| PluginError::Manifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
