use poolkit::PluginError;

#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    #[error("no federation plugin found, cannot connect to main net")]
    NoPlugin,

    #[error("plugin '{name}' is not loaded or does not provide federation")]
    PluginUnavailable { name: String },

    #[error("no federation plugin available")]
    NotInitialized,

    #[error("failed to register with main net: {0}")]
    Registration(PluginError),

    #[error("failed to discover pools: {0}")]
    Discovery(PluginError),

    #[error("failed to sync with peers: {0}")]
    Sync(PluginError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}
