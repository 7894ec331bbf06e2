//! Layered application configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults ([`AppConfig::default`])
//! 2. the YAML file given on the command line
//! 3. environment variables prefixed with [`ENV_PREFIX`], nested with `__`
//!    (`POOL__SERVER__ADDRESS=0.0.0.0:9000`,
//!    `POOL__MODULES__NODES_REGISTRY__CONFIG__MAX_NODES=10`)
//!
//! ```yaml
//! server:
//!   address: "0.0.0.0:50051"
//!   location: { region: eu-west, datacenter: ams1, coordinates: "52.37,4.89" }
//! logging:
//!   level: info
//!   format: json
//! plugins:
//!   - name: metrics
//!     kind: memory-metrics
//! plugin_dir: /etc/pool/plugins.d
//! modules:
//!   nodes_registry:
//!     config:
//!       max_nodes: 100
//!       health_check_interval: 30s
//!       hooks: [{ name: metrics }]
//!   federation:
//!     enabled: false
//! ```

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use poolkit::plugins::{PluginConfig, PoolLocation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "POOL__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Plugin instances to load at startup, in order.
    pub plugins: Vec<PluginConfig>,
    /// Directory of plugin manifests loaded after `plugins`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_dir: Option<PathBuf>,
    /// Per-module sections: `modules.<name> = { enabled, config }`.
    pub modules: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address of the registry API.
    pub address: String,
    pub location: PoolLocation,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:50051".to_owned(),
            location: PoolLocation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` (if any), then `POOL__*` environment variables.
    ///
    /// # Errors
    /// Returns an error if an explicitly given file does not exist, or if any layer
    /// fails to parse or does not match the schema.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))
    }

    /// Raise the log level for `-v` (info), `-vv` (debug) and `-vvv` (trace).
    pub fn apply_verbosity(&mut self, verbose: u8) {
        let level = match verbose {
            0 => return,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        level.clone_into(&mut self.logging.level);
    }

    /// Whether `modules.<name>` is present in the file or environment.
    #[must_use]
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Effective configuration rendered as YAML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration as YAML")
    }
}

impl poolkit::ConfigProvider for AppConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }
}
