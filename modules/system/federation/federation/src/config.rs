use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration of the federation module (`modules.federation.config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FederationConfig {
    /// Main-net registry the pool registers with.
    pub registry_address: String,

    /// Public domain of this pool.
    pub domain: String,

    /// Advertise the pool as open to public registration.
    pub public: bool,

    /// Peer sync period, humantime syntax.
    pub sync_interval: String,

    /// Federation plugin to use. Defaults to the first loaded plugin with the capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            registry_address: String::new(),
            domain: String::new(),
            public: true,
            sync_interval: "5m".to_owned(),
            plugin: None,
        }
    }
}

impl FederationConfig {
    /// Parsed sync period; malformed or zero values fall back to five minutes.
    #[must_use]
    pub fn sync_period(&self) -> Duration {
        match humantime::parse_duration(self.sync_interval.trim()) {
            Ok(period) if !period.is_zero() => period,
            _ => {
                tracing::warn!(value = %self.sync_interval, "Invalid sync interval, using default of 5m");
                DEFAULT_SYNC_INTERVAL
            }
        }
    }
}
