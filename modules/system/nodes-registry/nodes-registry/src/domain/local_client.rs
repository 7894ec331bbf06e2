use crate::domain::service::Service;
use nodes_registry_sdk::{
    HeartbeatRequest, HeartbeatResponse, ListNodesRequest, Node, NodesRegistryClient,
    NodesRegistryError, RegisterNodeRequest, RegisterNodeResponse,
};
use std::sync::Arc;

/// Local client implementation for the nodes registry
pub struct NodesRegistryLocalClient {
    service: Arc<Service>,
}

impl NodesRegistryLocalClient {
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl NodesRegistryClient for NodesRegistryLocalClient {
    async fn register_node(
        &self,
        req: RegisterNodeRequest,
    ) -> Result<RegisterNodeResponse, NodesRegistryError> {
        self.service.register_node(req).map_err(Into::into)
    }

    async fn heartbeat(
        &self,
        req: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, NodesRegistryError> {
        Ok(self.service.heartbeat(&req))
    }

    async fn list_nodes(&self, req: ListNodesRequest) -> Result<Vec<Node>, NodesRegistryError> {
        Ok(self.service.list_nodes(&req))
    }

    async fn get_node(&self, node_id: &str) -> Result<Node, NodesRegistryError> {
        self.service.get_node(node_id).map_err(Into::into)
    }

    async fn node_count(&self) -> Result<usize, NodesRegistryError> {
        Ok(self.service.node_count())
    }
}
