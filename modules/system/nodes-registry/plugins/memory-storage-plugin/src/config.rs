use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryStorageConfig {
    /// Upper bound on stored keys; unbounded when absent.
    pub max_entries: Option<usize>,
}
