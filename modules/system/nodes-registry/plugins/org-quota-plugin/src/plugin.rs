use async_trait::async_trait;
use parking_lot::Mutex;
use poolkit::plugins::{
    NodeFilter, NodeMetadata, Plugin, PluginError, PluginFactory, PluginSettings, RegistryHook,
    parse_settings,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::OrgQuotaConfig;

pub const PLUGIN_KIND: &str = "org-quota";

fn construct() -> Arc<dyn Plugin> {
    Arc::new(OrgQuotaPlugin::new())
}

inventory::submit! {
    PluginFactory::new(PLUGIN_KIND, "Per-organization node quotas", construct)
}

#[derive(Default)]
struct Usage {
    /// node id -> organization
    nodes: HashMap<String, String>,
    /// organization -> admitted nodes
    per_org: HashMap<String, usize>,
}

impl Usage {
    fn release(&mut self, node_id: &str) -> Option<String> {
        let org = self.nodes.remove(node_id)?;
        if let Some(count) = self.per_org.get_mut(&org) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.per_org.remove(&org);
            }
        }
        Some(org)
    }
}

#[derive(Default)]
pub struct OrgQuotaPlugin {
    config: Mutex<OrgQuotaConfig>,
    usage: Mutex<Usage>,
}

impl OrgQuotaPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes currently counted against `org`.
    #[must_use]
    pub fn usage(&self, org: &str) -> usize {
        self.usage.lock().per_org.get(org).copied().unwrap_or_default()
    }
}

#[async_trait]
impl Plugin for OrgQuotaPlugin {
    fn name(&self) -> &str {
        PLUGIN_KIND
    }

    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError> {
        let cfg: OrgQuotaConfig = parse_settings(PLUGIN_KIND, settings)?;
        tracing::info!(
            default_quota = ?cfg.default_quota,
            orgs = cfg.quotas.len(),
            "Org quota plugin initialized"
        );
        *self.config.lock() = cfg;
        Ok(())
    }

    fn as_registry_hook(self: Arc<Self>) -> Option<Arc<dyn RegistryHook>> {
        Some(self)
    }
}

impl RegistryHook for OrgQuotaPlugin {
    /// Re-registering a node under the same organization keeps its slot.
    fn on_node_register(&self, node_id: &str, metadata: &NodeMetadata) -> Result<(), PluginError> {
        let org = metadata.org.as_str();
        let quota = self.config.lock().quota_for(org);
        let mut usage = self.usage.lock();

        if usage.nodes.get(node_id).is_some_and(|o| o == org) {
            return Ok(());
        }

        let used = usage.per_org.get(org).copied().unwrap_or_default();
        if let Some(quota) = quota
            && used >= quota
        {
            tracing::info!(node_id = %node_id, org = %org, quota, "Organization quota exhausted");
            return Err(PluginError::rejected(format!(
                "Organization {org} reached its quota of {quota} nodes"
            )));
        }

        usage.release(node_id);
        usage.nodes.insert(node_id.to_owned(), org.to_owned());
        *usage.per_org.entry(org.to_owned()).or_default() += 1;
        Ok(())
    }

    fn on_node_heartbeat(&self, _node_id: &str) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_node_list(&self, _filter: &NodeFilter) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_node_deregister(&self, node_id: &str) -> Result<(), PluginError> {
        if let Some(org) = self.usage.lock().release(node_id) {
            tracing::debug!(node_id = %node_id, org = %org, "Released quota slot");
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    async fn plugin(settings: serde_json::Value) -> OrgQuotaPlugin {
        let plugin = OrgQuotaPlugin::new();
        let serde_json::Value::Object(settings) = settings else {
            unreachable!()
        };
        plugin.initialize(&settings).await.unwrap();
        plugin
    }

    fn node(node_id: &str, org: &str) -> NodeMetadata {
        NodeMetadata {
            node_id: node_id.to_owned(),
            specialization: "gpu".to_owned(),
            endpoint: format!("{node_id}:9000"),
            org: org.to_owned(),
            private_node: false,
        }
    }

    #[tokio::test]
    async fn vetoes_beyond_quota() {
        let quota = plugin(json!({"quotas": {"acme": 2}})).await;

        quota.on_node_register("n1", &node("n1", "acme")).unwrap();
        quota.on_node_register("n2", &node("n2", "acme")).unwrap();
        let err = quota.on_node_register("n3", &node("n3", "acme")).unwrap_err();

        assert_eq!(err.to_string(), "Organization acme reached its quota of 2 nodes");
        assert_eq!(quota.usage("acme"), 2);
        quota
            .on_node_register("n4", &node("n4", "globex"))
            .expect("Unlisted orgs are unlimited without a default quota");
    }

    #[tokio::test]
    async fn deregistration_frees_a_slot() {
        let quota = plugin(json!({"default_quota": 1})).await;

        quota.on_node_register("n1", &node("n1", "acme")).unwrap();
        assert!(quota.on_node_register("n2", &node("n2", "acme")).is_err());

        quota.on_node_deregister("n1").unwrap();
        assert_eq!(quota.usage("acme"), 0);
        quota.on_node_register("n2", &node("n2", "acme")).unwrap();
    }

    #[tokio::test]
    async fn re_registration_keeps_or_moves_the_slot() {
        let quota = plugin(json!({"default_quota": 1})).await;

        quota.on_node_register("n1", &node("n1", "acme")).unwrap();
        quota
            .on_node_register("n1", &node("n1", "acme"))
            .expect("Same node, same org keeps its slot");

        quota.on_node_register("n1", &node("n1", "globex")).unwrap();
        assert_eq!(quota.usage("acme"), 0);
        assert_eq!(quota.usage("globex"), 1);
    }

    #[tokio::test]
    async fn unknown_settings_are_rejected() {
        let quota = OrgQuotaPlugin::new();
        let serde_json::Value::Object(settings) = json!({"quota": 3}) else {
            unreachable!()
        };
        assert!(matches!(
            quota.initialize(&settings).await,
            Err(PluginError::InvalidConfig { .. })
        ));
    }
}
