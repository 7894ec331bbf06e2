#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use poolkit::PluginManager;
use poolkit::plugins::{NodeFilter, NodeMetadata, Plugin, PluginError, PluginSettings, RegistryHook};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nodes_registry::NodesRegistryConfig;
use nodes_registry::domain::service::Service;
use nodes_registry_sdk::RegisterNodeRequest;

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Registry hook that records every call and optionally vetoes registrations.
pub struct RecordingHook {
    name: String,
    log: CallLog,
    veto: Option<String>,
}

impl RecordingHook {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_owned(),
            log: log.clone(),
            veto: None,
        }
    }

    pub fn vetoing(mut self, reason: &str) -> Self {
        self.veto = Some(reason.to_owned());
        self
    }

    fn push(&self, call: String) {
        self.log.lock().push(format!("{}:{call}", self.name));
    }
}

#[async_trait]
impl Plugin for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _settings: &PluginSettings) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_registry_hook(self: Arc<Self>) -> Option<Arc<dyn RegistryHook>> {
        Some(self)
    }
}

impl RegistryHook for RecordingHook {
    fn on_node_register(&self, node_id: &str, _metadata: &NodeMetadata) -> Result<(), PluginError> {
        self.push(format!("register:{node_id}"));
        match &self.veto {
            Some(reason) => Err(PluginError::rejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn on_node_heartbeat(&self, node_id: &str) -> Result<(), PluginError> {
        self.push(format!("heartbeat:{node_id}"));
        Ok(())
    }

    fn on_node_list(&self, _filter: &NodeFilter) -> Result<(), PluginError> {
        self.push("list".to_owned());
        Ok(())
    }

    fn on_node_deregister(&self, node_id: &str) -> Result<(), PluginError> {
        self.push(format!("deregister:{node_id}"));
        Ok(())
    }
}

/// Registry hook named `switch` that vetoes registrations while its flag is set.
pub struct SwitchableVeto(pub Arc<AtomicBool>);

#[async_trait]
impl Plugin for SwitchableVeto {
    fn name(&self) -> &str {
        "switch"
    }

    async fn initialize(&self, _settings: &PluginSettings) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_registry_hook(self: Arc<Self>) -> Option<Arc<dyn RegistryHook>> {
        Some(self)
    }
}

impl RegistryHook for SwitchableVeto {
    fn on_node_register(
        &self,
        _node_id: &str,
        _metadata: &NodeMetadata,
    ) -> Result<(), PluginError> {
        if self.0.load(Ordering::SeqCst) {
            return Err(PluginError::rejected("switched off"));
        }
        Ok(())
    }

    fn on_node_heartbeat(&self, _node_id: &str) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_node_list(&self, _filter: &NodeFilter) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_node_deregister(&self, _node_id: &str) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Plugin without any capability.
pub struct InertPlugin;

#[async_trait]
impl Plugin for InertPlugin {
    fn name(&self) -> &str {
        "inert"
    }

    async fn initialize(&self, _settings: &PluginSettings) -> Result<(), PluginError> {
        Ok(())
    }
}

pub fn request(node_id: &str, specialization: &str, org: &str) -> RegisterNodeRequest {
    RegisterNodeRequest {
        node_id: node_id.to_owned(),
        specialization: specialization.to_owned(),
        endpoint: format!("{node_id}.pool.local:9000"),
        org: org.to_owned(),
        private_node: false,
    }
}

pub fn service(config: NodesRegistryConfig) -> Service {
    Service::new(config, Arc::new(PluginManager::new()))
}

pub fn service_with_plugins(config: NodesRegistryConfig, plugins: PluginManager) -> Service {
    Service::new(config, Arc::new(plugins))
}
