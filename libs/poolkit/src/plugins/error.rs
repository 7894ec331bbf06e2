use std::path::PathBuf;

/// Errors raised by plugins and by the plugin manager.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("plugin '{name}' not found")]
    NotFound { name: String },

    #[error("no plugin factory registered for kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("invalid configuration for plugin '{plugin}': {reason}")]
    InvalidConfig { plugin: String, reason: String },

    #[error("plugin '{plugin}' is not initialized")]
    NotInitialized { plugin: String },

    #[error("invalid plugin manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A hook refused an operation; the message is surfaced to the caller verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
