//! Capability contracts and the data they exchange.
//!
//! | Capability       | Used by                                 |
//! |------------------|-----------------------------------------|
//! | [`AuthPlugin`]   | HTTP request filter, credential checks  |
//! | [`MetricsPlugin`]| HTTP request filter, custom metrics     |
//! | [`StoragePlugin`]| key/value persistence for other plugins |
//! | [`RegistryHook`] | node registry operations                |
//! | [`FederationPlugin`] | main-net registration and peering   |
//!
//! `RegistryHook` methods are synchronous: the registry calls them while holding its
//! write lock, so they must return quickly and must not block on I/O.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{Plugin, PluginError};

/// String key/value pairs (metric labels, credential fields, request headers).
pub type Labels = BTreeMap<String, String>;

/// Credentials presented to [`AuthPlugin::authenticate`] (`token`, `username`, ...).
pub type Credentials = BTreeMap<String, String>;

/// Point-in-time metric values keyed by `name{label=value,...}`.
pub type MetricsSnapshot = BTreeMap<String, f64>;

/// What request filters see of an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    /// Header names are lowercase.
    pub headers: Labels,
}

impl RequestInfo {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Token from an `Authorization: Bearer <token>` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Candidate node passed to [`RegistryHook::on_node_register`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node_id: String,
    pub specialization: String,
    pub endpoint: String,
    pub org: String,
    pub private_node: bool,
}

/// Node listing filter. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

impl NodeFilter {
    /// Build a filter, treating empty strings as wildcards.
    #[must_use]
    pub fn new(specialization: Option<&str>, org: Option<&str>) -> Self {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_owned);
        Self {
            specialization: non_empty(specialization),
            org: non_empty(org),
        }
    }

    #[must_use]
    pub fn matches(&self, specialization: &str, org: &str) -> bool {
        self.specialization.as_deref().is_none_or(|s| s == specialization)
            && self.org.as_deref().is_none_or(|o| o == org)
    }
}

/// Physical placement of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolLocation {
    pub region: String,
    pub datacenter: String,
    pub coordinates: String,
}

/// How a pool describes itself to the main net and to peers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetadata {
    pub domain: String,
    pub address: String,
    #[serde(default)]
    pub location: PoolLocation,
    pub public: bool,
    pub max_nodes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,
}

/// Pool discovery filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolFilter {
    pub region: Option<String>,
    pub public_only: bool,
}

impl PoolFilter {
    #[must_use]
    pub fn matches(&self, pool: &PoolMetadata) -> bool {
        (!self.public_only || pool.public)
            && self
                .region
                .as_deref()
                .is_none_or(|r| r == pool.location.region)
    }
}

#[async_trait]
pub trait AuthPlugin: Plugin {
    /// Resolve credentials to a user id.
    async fn authenticate(&self, credentials: &Credentials) -> Result<String, PluginError>;

    /// Whether `user_id` may perform `action` on `resource`.
    async fn authorize(&self, user_id: &str, resource: &str, action: &str)
    -> Result<bool, PluginError>;

    /// Synchronous gate for inbound HTTP requests.
    fn filter_request(&self, request: &RequestInfo) -> Result<(), PluginError>;
}

pub trait MetricsPlugin: Plugin {
    fn record_metric(&self, name: &str, value: f64, labels: &Labels);

    fn snapshot(&self) -> MetricsSnapshot;

    /// Observe an inbound HTTP request. Metrics filters do not normally reject.
    fn filter_request(&self, request: &RequestInfo) -> Result<(), PluginError>;
}

#[async_trait]
pub trait StoragePlugin: Plugin {
    async fn store(&self, key: &str, value: Value) -> Result<(), PluginError>;

    async fn retrieve(&self, key: &str) -> Result<Option<Value>, PluginError>;

    /// Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> Result<bool, PluginError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, PluginError>;
}

pub trait RegistryHook: Plugin {
    /// Returning an error vetoes the registration with that error's message.
    fn on_node_register(&self, node_id: &str, metadata: &NodeMetadata) -> Result<(), PluginError>;

    fn on_node_heartbeat(&self, node_id: &str) -> Result<(), PluginError>;

    fn on_node_list(&self, filter: &NodeFilter) -> Result<(), PluginError>;

    fn on_node_deregister(&self, node_id: &str) -> Result<(), PluginError>;
}

#[async_trait]
pub trait FederationPlugin: Plugin {
    async fn register_with_main_net(
        &self,
        registry_address: &str,
        pool: &PoolMetadata,
    ) -> Result<(), PluginError>;

    async fn discover_pools(&self, filter: &PoolFilter) -> Result<Vec<PoolMetadata>, PluginError>;

    async fn sync_with_peers(&self) -> Result<(), PluginError>;

    async fn verify_node_payment(&self, node_id: &str, account: &str) -> Result<bool, PluginError>;

    async fn distribute_rewards(&self, total_fees: u64, accounts: &[String])
    -> Result<(), PluginError>;
}

/// Capability tags, for logging and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    Auth,
    Metrics,
    Storage,
    RegistryHook,
    Federation,
}

impl CapabilityKind {
    pub const ALL: [Self; 5] = [
        Self::Auth,
        Self::Metrics,
        Self::Storage,
        Self::RegistryHook,
        Self::Federation,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Metrics => "metrics",
            Self::Storage => "storage",
            Self::RegistryHook => "registry_hook",
            Self::Federation => "federation",
        }
    }

    /// Whether `plugin` offers this capability.
    #[must_use]
    pub fn offered_by(self, plugin: &Arc<dyn Plugin>) -> bool {
        let plugin = Arc::clone(plugin);
        match self {
            Self::Auth => plugin.as_auth().is_some(),
            Self::Metrics => plugin.as_metrics().is_some(),
            Self::Storage => plugin.as_storage().is_some(),
            Self::RegistryHook => plugin.as_registry_hook().is_some(),
            Self::Federation => plugin.as_federation().is_some(),
        }
    }

    /// All capabilities `plugin` offers.
    #[must_use]
    pub fn of(plugin: &Arc<dyn Plugin>) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.offered_by(plugin))
            .collect()
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic access to a capability view, so callers can write
/// `manager.get_as::<dyn RegistryHook>("quota")`.
pub trait Capability: Send + Sync + 'static {
    const KIND: CapabilityKind;

    fn view(plugin: Arc<dyn Plugin>) -> Option<Arc<Self>>;
}

impl Capability for dyn AuthPlugin {
    const KIND: CapabilityKind = CapabilityKind::Auth;

    fn view(plugin: Arc<dyn Plugin>) -> Option<Arc<Self>> {
        plugin.as_auth()
    }
}

impl Capability for dyn MetricsPlugin {
    const KIND: CapabilityKind = CapabilityKind::Metrics;

    fn view(plugin: Arc<dyn Plugin>) -> Option<Arc<Self>> {
        plugin.as_metrics()
    }
}

impl Capability for dyn StoragePlugin {
    const KIND: CapabilityKind = CapabilityKind::Storage;

    fn view(plugin: Arc<dyn Plugin>) -> Option<Arc<Self>> {
        plugin.as_storage()
    }
}

impl Capability for dyn RegistryHook {
    const KIND: CapabilityKind = CapabilityKind::RegistryHook;

    fn view(plugin: Arc<dyn Plugin>) -> Option<Arc<Self>> {
        plugin.as_registry_hook()
    }
}

impl Capability for dyn FederationPlugin {
    const KIND: CapabilityKind = CapabilityKind::Federation;

    fn view(plugin: Arc<dyn Plugin>) -> Option<Arc<Self>> {
        plugin.as_federation()
    }
}
