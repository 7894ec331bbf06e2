#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{kind} '{name}' is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    #[error("{kind} {unit} depends on unknown {kind} {dependency}")]
    UnknownDependency {
        kind: &'static str,
        unit: String,
        dependency: String,
    },

    #[error("circular dependency detected among: {}", units.join(", "))]
    CircularDependency { units: Vec<String> },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("failed to start {kind} '{name}': {source}")]
    Start {
        kind: &'static str,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to stop {kind} '{name}': {source}")]
    Stop {
        kind: &'static str,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
