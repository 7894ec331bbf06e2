use async_trait::async_trait;
use dashmap::DashMap;
use poolkit::plugins::{
    Labels, MetricsPlugin, MetricsSnapshot, NodeFilter, NodeMetadata, Plugin, PluginError,
    PluginFactory, PluginSettings, RegistryHook, RequestInfo, parse_settings,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::MemoryMetricsConfig;

pub const PLUGIN_KIND: &str = "memory-metrics";

pub const REGISTRATIONS: &str = "registry_registrations_total";
pub const HEARTBEATS: &str = "registry_heartbeats_total";
pub const LISTINGS: &str = "registry_listings_total";
pub const DEREGISTRATIONS: &str = "registry_deregistrations_total";
pub const REQUESTS_RECEIVED: &str = "http_requests_received_total";

fn construct() -> Arc<dyn Plugin> {
    Arc::new(MemoryMetricsPlugin::new())
}

inventory::submit! {
    PluginFactory::new(
        PLUGIN_KIND,
        "In-memory counters for registry activity and requests",
        construct
    )
}

/// Snapshot key of a metric: `name` or `name{k="v",...}` with labels in key order.
#[must_use]
pub fn metric_key(name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return name.to_owned();
    }
    let labels: Vec<String> = labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
    format!("{name}{{{}}}", labels.join(","))
}

/// Metric values accumulate: recording `v` adds `v` to the current value.
pub struct MemoryMetricsPlugin {
    values: DashMap<String, f64>,
    prefix: OnceLock<String>,
    track_registry: AtomicBool,
}

impl Default for MemoryMetricsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetricsPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            prefix: OnceLock::new(),
            track_registry: AtomicBool::new(true),
        }
    }

    fn key(&self, name: &str, labels: &Labels) -> String {
        match self.prefix.get() {
            Some(prefix) => metric_key(&format!("{prefix}{name}"), labels),
            None => metric_key(name, labels),
        }
    }

    /// Current value of a metric, `0.0` when never recorded.
    #[must_use]
    pub fn value(&self, name: &str, labels: &Labels) -> f64 {
        self.values
            .get(&self.key(name, labels))
            .map_or(0.0, |v| *v)
    }

    fn count_registry(&self, name: &str, labels: &Labels) {
        if self.track_registry.load(Ordering::Relaxed) {
            self.record_metric(name, 1.0, labels);
        }
    }
}

#[async_trait]
impl Plugin for MemoryMetricsPlugin {
    fn name(&self) -> &str {
        PLUGIN_KIND
    }

    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError> {
        let cfg: MemoryMetricsConfig = parse_settings(PLUGIN_KIND, settings)?;
        if self.prefix.set(cfg.prefix).is_err() {
            tracing::warn!("Memory metrics plugin initialized twice; keeping the first prefix");
        }
        self.track_registry.store(cfg.track_registry, Ordering::Relaxed);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        tracing::debug!(series = self.values.len(), "Memory metrics plugin shut down");
        self.values.clear();
        Ok(())
    }

    fn as_metrics(self: Arc<Self>) -> Option<Arc<dyn MetricsPlugin>> {
        Some(self)
    }

    fn as_registry_hook(self: Arc<Self>) -> Option<Arc<dyn RegistryHook>> {
        Some(self)
    }
}

impl MetricsPlugin for MemoryMetricsPlugin {
    fn record_metric(&self, name: &str, value: f64, labels: &Labels) {
        let key = self.key(name, labels);
        *self.values.entry(key).or_insert(0.0) += value;
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn filter_request(&self, request: &RequestInfo) -> Result<(), PluginError> {
        let labels = Labels::from([("method".to_owned(), request.method.clone())]);
        self.record_metric(REQUESTS_RECEIVED, 1.0, &labels);
        Ok(())
    }
}

impl RegistryHook for MemoryMetricsPlugin {
    fn on_node_register(&self, _node_id: &str, metadata: &NodeMetadata) -> Result<(), PluginError> {
        let labels = Labels::from([
            ("specialization".to_owned(), metadata.specialization.clone()),
            ("org".to_owned(), metadata.org.clone()),
        ]);
        self.count_registry(REGISTRATIONS, &labels);
        Ok(())
    }

    fn on_node_heartbeat(&self, _node_id: &str) -> Result<(), PluginError> {
        self.count_registry(HEARTBEATS, &Labels::new());
        Ok(())
    }

    fn on_node_list(&self, _filter: &NodeFilter) -> Result<(), PluginError> {
        self.count_registry(LISTINGS, &Labels::new());
        Ok(())
    }

    fn on_node_deregister(&self, _node_id: &str) -> Result<(), PluginError> {
        self.count_registry(DEREGISTRATIONS, &Labels::new());
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> PluginSettings {
        match value {
            serde_json::Value::Object(map) => map,
            _ => PluginSettings::new(),
        }
    }

    fn metadata(org: &str) -> NodeMetadata {
        NodeMetadata {
            node_id: "n1".to_owned(),
            specialization: "gpu".to_owned(),
            endpoint: "n1:9000".to_owned(),
            org: org.to_owned(),
            private_node: false,
        }
    }

    #[test]
    fn keys_render_labels_in_order() {
        let labels = Labels::from([
            ("path".to_owned(), "/nodes".to_owned()),
            ("method".to_owned(), "GET".to_owned()),
        ]);
        assert_eq!(
            metric_key("http_requests_total", &labels),
            r#"http_requests_total{method="GET",path="/nodes"}"#
        );
        assert_eq!(metric_key("up", &Labels::new()), "up");
    }

    #[tokio::test]
    async fn values_accumulate_under_prefix() {
        let plugin = MemoryMetricsPlugin::new();
        plugin
            .initialize(&settings(json!({"prefix": "pool_"})))
            .await
            .unwrap();

        plugin.record_metric("jobs", 2.0, &Labels::new());
        plugin.record_metric("jobs", 3.0, &Labels::new());

        assert!((plugin.value("jobs", &Labels::new()) - 5.0).abs() < f64::EPSILON);
        assert_eq!(plugin.snapshot().keys().collect::<Vec<_>>(), vec!["pool_jobs"]);
    }

    #[tokio::test]
    async fn registry_hooks_are_counted() {
        let plugin = MemoryMetricsPlugin::new();
        plugin.initialize(&PluginSettings::new()).await.unwrap();

        plugin.on_node_register("n1", &metadata("acme")).unwrap();
        plugin.on_node_register("n2", &metadata("acme")).unwrap();
        plugin.on_node_heartbeat("n1").unwrap();
        plugin.on_node_deregister("n2").unwrap();

        let snapshot = plugin.snapshot();
        let acme = r#"registry_registrations_total{org="acme",specialization="gpu"}"#;
        assert!((snapshot[acme] - 2.0).abs() < f64::EPSILON);
        assert!((snapshot[HEARTBEATS] - 1.0).abs() < f64::EPSILON);
        assert!((snapshot[DEREGISTRATIONS] - 1.0).abs() < f64::EPSILON);
        assert!(!snapshot.contains_key(LISTINGS));
    }

    #[tokio::test]
    async fn registry_tracking_can_be_disabled() {
        let plugin = MemoryMetricsPlugin::new();
        plugin
            .initialize(&settings(json!({"track_registry": false})))
            .await
            .unwrap();

        plugin.on_node_heartbeat("n1").unwrap();
        let request = RequestInfo {
            method: "GET".to_owned(),
            path: "/nodes".to_owned(),
            ..RequestInfo::default()
        };
        plugin.filter_request(&request).unwrap();

        assert_eq!(
            plugin.snapshot().into_keys().collect::<Vec<_>>(),
            vec![r#"http_requests_received_total{method="GET"}"#]
        );
    }
}
