use chrono::{DateTime, Utc};
use nodes_registry_sdk::{ListNodesRequest, Node, NodeStatus};
use serde::{Deserialize, Serialize};

/// REST view of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDto {
    pub node_id: String,
    pub specialization: String,
    pub endpoint: String,
    pub org: String,
    pub private_node: bool,
    pub status: NodeStatus,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl From<Node> for NodeDto {
    fn from(node: Node) -> Self {
        Self {
            node_id: node.node_id,
            specialization: node.specialization,
            endpoint: node.endpoint,
            org: node.org,
            private_node: node.private_node,
            status: node.status,
            registered_at: node.registered_at,
            last_heartbeat_at: node.last_heartbeat_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNodesDto {
    pub nodes: Vec<NodeDto>,
}

/// `GET /nodes` query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListNodesQuery {
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
}

impl From<ListNodesQuery> for ListNodesRequest {
    fn from(q: ListNodesQuery) -> Self {
        Self {
            specialization: q.specialization,
            org: q.org,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsDto {
    pub node_count: usize,
    pub max_nodes: usize,
}
