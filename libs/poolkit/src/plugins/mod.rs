//! Capability-typed plugin framework.
//!
//! A plugin is one object implementing [`Plugin`] plus any subset of the capability
//! traits in [`capabilities`]. Callers never downcast to concrete types: they ask for a
//! capability view (`plugin.as_registry_hook()`, or generically through [`Capability`])
//! and get `None` when the plugin does not provide it.
//!
//! Plugins are compiled in. Each plugin crate submits a [`PluginFactory`] to the
//! [`PluginCatalog`], and the [`PluginManager`] instantiates factories named by
//! configuration entries or manifest files.

pub mod capabilities;
mod catalog;
mod error;
mod manager;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use capabilities::{
    AuthPlugin, Capability, CapabilityKind, Credentials, FederationPlugin, Labels, MetricsPlugin,
    MetricsSnapshot, NodeFilter, NodeMetadata, PoolFilter, PoolLocation, PoolMetadata,
    RegistryHook, RequestInfo, StoragePlugin,
};
pub use catalog::{PluginCatalog, PluginFactory};
pub use error::PluginError;
pub use manager::{LoadReport, PluginManager};

/// Container name under which the process-wide [`PluginManager`] is published.
pub const PLUGIN_MANAGER_SERVICE: &str = "plugin_manager";

/// Opaque settings map handed to [`Plugin::initialize`].
pub type PluginSettings = serde_json::Map<String, serde_json::Value>;

/// Base contract shared by every plugin.
///
/// Instances are built by a factory with no arguments, then initialized exactly once
/// with their settings before being registered, and shut down by the manager on exit.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Self-reported plugin name.
    fn name(&self) -> &str;

    /// Apply settings and acquire resources.
    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError>;

    /// Release resources. Called once, in reverse registration order.
    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_auth(self: Arc<Self>) -> Option<Arc<dyn AuthPlugin>> {
        None
    }

    fn as_metrics(self: Arc<Self>) -> Option<Arc<dyn MetricsPlugin>> {
        None
    }

    fn as_storage(self: Arc<Self>) -> Option<Arc<dyn StoragePlugin>> {
        None
    }

    fn as_registry_hook(self: Arc<Self>) -> Option<Arc<dyn RegistryHook>> {
        None
    }

    fn as_federation(self: Arc<Self>) -> Option<Arc<dyn FederationPlugin>> {
        None
    }
}

/// One configured plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Name the instance is registered under.
    pub name: String,

    /// Catalog factory to instantiate. Defaults to `name`.
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub config: PluginSettings,
}

fn default_enabled() -> bool {
    true
}

impl PluginConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            enabled: true,
            config: PluginSettings::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn with_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Factory kind to look up in the catalog.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }
}

/// Decode a settings map into a typed plugin config.
///
/// # Errors
/// Returns [`PluginError::InvalidConfig`] when the settings do not match `T`.
pub fn parse_settings<T: serde::de::DeserializeOwned>(
    plugin: &str,
    settings: &PluginSettings,
) -> Result<T, PluginError> {
    serde_json::from_value(serde_json::Value::Object(settings.clone())).map_err(|e| {
        PluginError::InvalidConfig {
            plugin: plugin.to_owned(),
            reason: e.to_string(),
        }
    })
}
