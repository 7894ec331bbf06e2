#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Plugin loading from configuration entries and manifest directories.

use async_trait::async_trait;
use parking_lot::Mutex;
use poolkit::plugins::{
    LoadReport, Plugin, PluginCatalog, PluginConfig, PluginError, PluginFactory, PluginManager,
    PluginSettings, StoragePlugin, parse_settings,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

static SHUTDOWNS: LazyLock<Mutex<Vec<String>>> = LazyLock::new(|| Mutex::new(Vec::new()));

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct KvSettings {
    label: String,
}

/// Minimal storage plugin; `label` is mandatory so bad settings fail initialization.
#[derive(Default)]
struct KvPlugin {
    label: Mutex<Option<String>>,
    data: Mutex<BTreeMap<String, Value>>,
}

#[async_trait]
impl Plugin for KvPlugin {
    fn name(&self) -> &str {
        "kv"
    }

    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError> {
        let cfg: KvSettings = parse_settings("kv", settings)?;
        *self.label.lock() = Some(cfg.label);
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        let label = self.label.lock().clone().unwrap_or_default();
        SHUTDOWNS.lock().push(label);
        Ok(())
    }

    fn as_storage(self: Arc<Self>) -> Option<Arc<dyn StoragePlugin>> {
        Some(self)
    }
}

#[async_trait]
impl StoragePlugin for KvPlugin {
    async fn store(&self, key: &str, value: Value) -> Result<(), PluginError> {
        self.data.lock().insert(key.to_owned(), value);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Value>, PluginError> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, PluginError> {
        Ok(self.data.lock().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PluginError> {
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

fn construct_kv() -> Arc<dyn Plugin> {
    Arc::new(KvPlugin::default())
}

fn catalog() -> PluginCatalog {
    PluginCatalog::new().with_factory(PluginFactory::new(
        "kv",
        "test key-value store",
        construct_kv,
    ))
}

fn skipped_names(report: &LoadReport) -> Vec<&str> {
    report.skipped.iter().map(|(n, _)| n.as_str()).collect()
}

#[tokio::test]
async fn configs_are_loaded_under_their_configured_names() {
    let pm = PluginManager::new();
    let configs = vec![
        PluginConfig::new("primary")
            .with_kind("kv")
            .with_setting("label", "primary"),
        PluginConfig::new("secondary")
            .with_kind("kv")
            .with_setting("label", "secondary"),
    ];

    let report = pm.load_from_configs(&catalog(), &configs).await;

    assert_eq!(report.loaded, vec!["primary", "secondary"]);
    assert!(report.skipped.is_empty());
    let storage = pm.get_as::<dyn StoragePlugin>("secondary").unwrap().unwrap();
    storage.store("nodes/n1", Value::from(1)).await.unwrap();
    assert_eq!(storage.list("nodes/").await.unwrap(), vec!["nodes/n1"]);
    assert!(
        pm.get_as::<dyn StoragePlugin>("primary")
            .unwrap()
            .unwrap()
            .retrieve("nodes/n1")
            .await
            .unwrap()
            .is_none(),
        "Instances are independent"
    );
}

#[tokio::test]
async fn disabled_unknown_and_misconfigured_entries_are_skipped() {
    let pm = PluginManager::new();
    let configs = vec![
        PluginConfig::new("off")
            .with_kind("kv")
            .with_setting("label", "off")
            .disabled(),
        PluginConfig::new("mystery"),
        PluginConfig::new("broken").with_kind("kv"),
        PluginConfig::new("ok").with_kind("kv").with_setting("label", "ok"),
        PluginConfig::new("ok").with_kind("kv").with_setting("label", "again"),
    ];

    let report = pm.load_from_configs(&catalog(), &configs).await;

    assert_eq!(report.loaded, vec!["ok"]);
    assert_eq!(skipped_names(&report), vec!["mystery", "broken", "ok"]);
    assert!(matches!(report.skipped[0].1, PluginError::UnknownKind { .. }));
    assert!(matches!(report.skipped[1].1, PluginError::InvalidConfig { .. }));
    assert!(matches!(report.skipped[2].1, PluginError::AlreadyRegistered { .. }));
    assert_eq!(pm.names(), vec!["ok"]);
}

#[tokio::test]
async fn manifests_are_loaded_in_file_name_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("20-cache.json"),
        r#"{"name": "cache", "kind": "kv", "config": {"label": "cache"}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("10-store.yaml"),
        "name: store\nkind: kv\nconfig:\n  label: store\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("30-bad.yml"), "name: bad\nunexpected: true\n").unwrap();
    std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

    let pm = PluginManager::new();
    let report = pm.load_from_dir(&catalog(), dir.path()).await.unwrap();

    assert_eq!(report.loaded, vec!["store", "cache"]);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("30-bad.yml"));
    assert!(matches!(report.skipped[0].1, PluginError::Manifest { .. }));
}

#[tokio::test]
async fn missing_manifest_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let pm = PluginManager::new();
    let err = pm
        .load_from_dir(&catalog(), &dir.path().join("absent"))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Manifest { .. }));
}

#[tokio::test]
async fn shutdown_runs_in_reverse_registration_order() {
    let pm = PluginManager::new();
    let configs: Vec<PluginConfig> = ["shutdown-a", "shutdown-b", "shutdown-c"]
        .into_iter()
        .map(|n| PluginConfig::new(n).with_kind("kv").with_setting("label", n))
        .collect();
    pm.load_from_configs(&catalog(), &configs).await;

    pm.shutdown_all().await.unwrap();

    let order: Vec<String> = SHUTDOWNS
        .lock()
        .iter()
        .filter(|l| l.starts_with("shutdown-"))
        .cloned()
        .collect();
    assert_eq!(order, vec!["shutdown-c", "shutdown-b", "shutdown-a"]);
}

#[tokio::test]
async fn plugin_losing_a_name_race_is_shut_down() {
    let pm = PluginManager::new();
    let catalog = catalog();
    let first = PluginConfig::new("shared")
        .with_kind("kv")
        .with_setting("label", "race-first");
    let second = PluginConfig::new("shared")
        .with_kind("kv")
        .with_setting("label", "race-second");

    let (a, b) = tokio::join!(pm.load(&catalog, &first), pm.load(&catalog, &second));

    a.unwrap();
    assert!(matches!(b, Err(PluginError::AlreadyRegistered { ref name }) if name == "shared"));
    assert_eq!(pm.len(), 1);
    let shut_down: Vec<String> = SHUTDOWNS
        .lock()
        .iter()
        .filter(|l| l.starts_with("race-"))
        .cloned()
        .collect();
    assert_eq!(shut_down, vec!["race-second"]);
}
