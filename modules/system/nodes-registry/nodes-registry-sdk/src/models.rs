use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Healthy,
    Unhealthy,
}

/// A compute node admitted to the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub specialization: String,
    pub endpoint: String,
    pub org: String,
    pub private_node: bool,
    pub status: NodeStatus,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    /// Health ticks since the last heartbeat.
    pub missed_heartbeats: u32,
}

impl Node {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == NodeStatus::Healthy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNodeRequest {
    pub node_id: String,
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub private_node: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNodeResponse {
    pub success: bool,
    pub message: String,
}

impl RegisterNodeResponse {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: "Node registered successfully".to_owned(),
        }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub alive: bool,
    pub message: String,
}

impl HeartbeatResponse {
    #[must_use]
    pub fn acknowledged() -> Self {
        Self {
            alive: true,
            message: "Heartbeat acknowledged".to_owned(),
        }
    }

    #[must_use]
    pub fn unknown_node() -> Self {
        Self {
            alive: false,
            message: "Node not registered".to_owned(),
        }
    }
}

/// Listing filters; `None` or empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListNodesRequest {
    pub specialization: Option<String>,
    pub org: Option<String>,
}

impl ListNodesRequest {
    #[must_use]
    pub fn by_specialization(spec: impl Into<String>) -> Self {
        Self {
            specialization: Some(spec.into()),
            org: None,
        }
    }

    #[must_use]
    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNodesResponse {
    pub nodes: Vec<Node>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn register_request_defaults_optional_fields() {
        let req: RegisterNodeRequest = serde_json::from_str(r#"{"node_id": "n1"}"#).unwrap();
        assert_eq!(req.node_id, "n1");
        assert!(req.org.is_empty());
        assert!(!req.private_node);
    }

    #[test]
    fn status_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&NodeStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }
}
