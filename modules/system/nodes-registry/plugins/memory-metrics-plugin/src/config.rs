use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryMetricsConfig {
    /// Prepended to every metric name.
    pub prefix: String,

    /// Count registry hook calls (`registry_*_total`).
    pub track_registry: bool,
}

impl Default for MemoryMetricsConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            track_registry: true,
        }
    }
}
