use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use poolkit::plugins::{
    Plugin, PluginError, PluginFactory, PluginSettings, StoragePlugin, parse_settings,
};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::config::MemoryStorageConfig;

pub const PLUGIN_KIND: &str = "memory-storage";

fn construct() -> Arc<dyn Plugin> {
    Arc::new(MemoryStoragePlugin::new())
}

inventory::submit! {
    PluginFactory::new(PLUGIN_KIND, "Concurrent in-memory key-value storage", construct)
}

#[derive(Default)]
pub struct MemoryStoragePlugin {
    entries: DashMap<String, Value>,
    max_entries: OnceLock<Option<usize>>,
}

impl MemoryStoragePlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn limit(&self) -> Option<usize> {
        self.max_entries.get().copied().flatten()
    }
}

#[async_trait]
impl Plugin for MemoryStoragePlugin {
    fn name(&self) -> &str {
        PLUGIN_KIND
    }

    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError> {
        let cfg: MemoryStorageConfig = parse_settings(PLUGIN_KIND, settings)?;
        if cfg.max_entries == Some(0) {
            return Err(PluginError::InvalidConfig {
                plugin: PLUGIN_KIND.to_owned(),
                reason: "max_entries must be greater than zero".to_owned(),
            });
        }
        if self.max_entries.set(cfg.max_entries).is_err() {
            tracing::warn!("Memory storage plugin initialized twice; keeping the first limit");
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        tracing::debug!(entries = self.entries.len(), "Memory storage plugin shut down");
        self.entries.clear();
        Ok(())
    }

    fn as_storage(self: Arc<Self>) -> Option<Arc<dyn StoragePlugin>> {
        Some(self)
    }
}

#[async_trait]
impl StoragePlugin for MemoryStoragePlugin {
    /// Overwriting an existing key is always allowed; new keys are refused at the limit.
    async fn store(&self, key: &str, value: Value) -> Result<(), PluginError> {
        // length is read before taking the entry lock; the bound is approximate under races
        let full = self.limit().is_some_and(|max| self.entries.len() >= max);
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut slot) => {
                slot.insert(value);
            }
            Entry::Vacant(_) if full => {
                return Err(PluginError::rejected(format!(
                    "storage limit of {} entries reached",
                    self.limit().unwrap_or_default()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Value>, PluginError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, PluginError> {
        Ok(self.entries.remove(key).is_some())
    }

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, PluginError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
