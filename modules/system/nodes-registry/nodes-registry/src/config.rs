use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration of the nodes registry (`modules.nodes_registry.config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodesRegistryConfig {
    /// Capacity of the pool.
    pub max_nodes: usize,

    /// Period of the health sweep, humantime syntax (`30s`, `1m 30s`).
    pub health_check_interval: String,

    /// Consecutive missed sweeps after which a node is removed.
    pub auto_deregister_after: u32,

    /// Consecutive missed sweeps after which a node is reported unhealthy.
    pub unhealthy_after: u32,

    /// When `false` and `allowed_orgs` is non-empty, only listed organizations may register.
    pub allow_public_registration: bool,

    pub allowed_orgs: Vec<String>,

    /// Registry hook plugins, called in this order.
    pub hooks: Vec<HookRef>,
}

impl Default for NodesRegistryConfig {
    fn default() -> Self {
        Self {
            max_nodes: 100,
            health_check_interval: "30s".to_owned(),
            auto_deregister_after: 3,
            unhealthy_after: 2,
            allow_public_registration: true,
            allowed_orgs: Vec::new(),
            hooks: Vec::new(),
        }
    }
}

/// Reference to a registered plugin by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookRef {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl HookRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl NodesRegistryConfig {
    /// Parsed sweep period. Malformed or zero values fall back to 30s with a warning.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        match humantime::parse_duration(self.health_check_interval.trim()) {
            Ok(interval) if !interval.is_zero() => interval,
            Ok(_) => {
                tracing::warn!(
                    value = %self.health_check_interval,
                    "Zero health check interval, using default of 30s"
                );
                DEFAULT_HEALTH_CHECK_INTERVAL
            }
            Err(e) => {
                tracing::warn!(
                    value = %self.health_check_interval,
                    error = %e,
                    "Invalid health check interval, using default of 30s"
                );
                DEFAULT_HEALTH_CHECK_INTERVAL
            }
        }
    }

    /// Whether `org` passes the private-pool allow-list.
    #[must_use]
    pub fn org_allowed(&self, org: &str) -> bool {
        self.allow_public_registration
            || self.allowed_orgs.is_empty()
            || self.allowed_orgs.iter().any(|allowed| allowed == org)
    }
}
