/// Errors for the nodes registry module
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodesRegistryError {
    #[error("Node not found with ID: {0}")]
    NodeNotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Nodes registry is not running")]
    Unavailable,

    #[error("An internal error occurred")]
    Internal,
}
