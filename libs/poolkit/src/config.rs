//! Typed access to per-module configuration sections.
//!
//! The application config carries a `modules` map shaped as
//! `modules.<name> = { enabled: bool, config: { ... } }`. Modules read their own
//! section through a [`ConfigProvider`] in one of two modes:
//!
//! 1. **Lenient** ([`module_config_or_default`]): a missing module, a non-object value or a
//!    missing `config` key all yield `T::default()`.
//! 2. **Strict** ([`module_config_required`]): the section must be present and valid.
//!
//! In both modes a present-but-malformed `config` is an error.

use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("module '{module}' not found")]
    ModuleNotFound { module: String },
    #[error("module '{module}' config must be an object")]
    InvalidModuleStructure { module: String },
    #[error("missing 'config' section in module '{module}'")]
    MissingConfigSection { module: String },
    #[error("invalid config for module '{module}': {source}")]
    InvalidConfig {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Provider of raw module sections.
pub trait ConfigProvider: Send + Sync {
    /// Raw JSON value of `modules.<module_name>`, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// Whether `modules.<name>.enabled` allows the module to run. Absent means enabled.
#[must_use]
pub fn module_enabled(provider: &dyn ConfigProvider, module_name: &str) -> bool {
    provider
        .get_module_config(module_name)
        .and_then(|raw| raw.get("enabled"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(true)
}

/// Lenient loader: falls back to `T::default()` when the section is absent.
///
/// # Errors
/// Returns `ConfigError::InvalidConfig` if the `config` section exists but cannot be deserialized.
pub fn module_config_or_default<T: DeserializeOwned + Default>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    let Some(section) = provider
        .get_module_config(module_name)
        .and_then(serde_json::Value::as_object)
        .and_then(|obj| obj.get("config"))
    else {
        return Ok(T::default());
    };

    parse_section(module_name, section)
}

/// Strict loader: the module and its `config` section must both exist.
///
/// # Errors
/// Returns `ConfigError` if the module is not found, has invalid structure, or config is invalid.
pub fn module_config_required<T: DeserializeOwned>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    let raw = provider
        .get_module_config(module_name)
        .ok_or_else(|| ConfigError::ModuleNotFound {
            module: module_name.to_owned(),
        })?;

    let section = raw
        .as_object()
        .ok_or_else(|| ConfigError::InvalidModuleStructure {
            module: module_name.to_owned(),
        })?
        .get("config")
        .ok_or_else(|| ConfigError::MissingConfigSection {
            module: module_name.to_owned(),
        })?;

    parse_section(module_name, section)
}

fn parse_section<T: DeserializeOwned>(
    module_name: &str,
    section: &serde_json::Value,
) -> Result<T, ConfigError> {
    T::deserialize(section).map_err(|e| ConfigError::InvalidConfig {
        module: module_name.to_owned(),
        source: e,
    })
}
