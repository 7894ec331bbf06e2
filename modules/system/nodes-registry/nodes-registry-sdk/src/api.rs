use async_trait::async_trait;

use crate::error::NodesRegistryError;
use crate::models::{
    HeartbeatRequest, HeartbeatResponse, ListNodesRequest, Node, RegisterNodeRequest,
    RegisterNodeResponse,
};

/// Container name of the `Arc<dyn NodesRegistryClient>` published by the registry module.
pub const NODES_REGISTRY_CLIENT: &str = "nodes_registry_client";

/// In-process API of the nodes registry.
///
/// Admission decisions (capacity, organization policy, hook vetoes) are reported in-band
/// through `RegisterNodeResponse::success`; `Err` is reserved for malformed input and
/// registry failures.
#[async_trait]
pub trait NodesRegistryClient: Send + Sync {
    async fn register_node(
        &self,
        req: RegisterNodeRequest,
    ) -> Result<RegisterNodeResponse, NodesRegistryError>;

    async fn heartbeat(&self, req: HeartbeatRequest)
    -> Result<HeartbeatResponse, NodesRegistryError>;

    /// Healthy nodes matching the request filters, ordered by `node_id`.
    async fn list_nodes(&self, req: ListNodesRequest) -> Result<Vec<Node>, NodesRegistryError>;

    async fn get_node(&self, node_id: &str) -> Result<Node, NodesRegistryError>;

    /// Registered nodes regardless of health.
    async fn node_count(&self) -> Result<usize, NodesRegistryError>;
}
