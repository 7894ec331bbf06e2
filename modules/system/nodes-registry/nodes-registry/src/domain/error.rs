/// Domain-level errors for nodes registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DomainError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<DomainError> for nodes_registry_sdk::NodesRegistryError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NodeNotFound(id) => Self::NodeNotFound(id),
            DomainError::InvalidInput(msg) => Self::Validation(msg),
            DomainError::Internal(_) => Self::Internal,
        }
    }
}
