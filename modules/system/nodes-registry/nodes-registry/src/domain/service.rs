use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use nodes_registry_sdk::{
    HeartbeatRequest, HeartbeatResponse, ListNodesRequest, Node, NodeStatus, RegisterNodeRequest,
    RegisterNodeResponse,
};
use poolkit::plugins::{NodeFilter, NodeMetadata, RegistryHook};
use poolkit::{Event, EventDispatcher, PluginManager};

use super::error::DomainError;
use super::node_storage::NodeStorage;
use crate::config::NodesRegistryConfig;

pub const EVENT_NODE_REGISTERED: &str = "node.registered";
pub const EVENT_NODE_HEARTBEAT: &str = "node.heartbeat";
pub const EVENT_NODE_DEREGISTERED: &str = "node.deregistered";

type Hooks = Vec<(String, Arc<dyn RegistryHook>)>;

/// Node registry service.
///
/// Every operation takes the node lock once and runs the configured registry hooks while
/// holding it, so hooks observe operations in a single serial order.
pub struct Service {
    config: NodesRegistryConfig,
    nodes: RwLock<NodeStorage>,
    plugins: Arc<PluginManager>,
    events: Option<Arc<EventDispatcher>>,
}

impl Service {
    #[must_use]
    pub fn new(config: NodesRegistryConfig, plugins: Arc<PluginManager>) -> Self {
        Self {
            config,
            nodes: RwLock::new(NodeStorage::new()),
            plugins,
            events: None,
        }
    }

    /// Publish `node.*` events on `dispatcher`.
    #[must_use]
    pub fn with_events(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.events = Some(dispatcher);
        self
    }

    #[must_use]
    pub fn config(&self) -> &NodesRegistryConfig {
        &self.config
    }

    /// Admit a node.
    ///
    /// Checks run in order: capacity, organization allow-list, then each hook. The first
    /// failing check decides the response and nothing is stored. Hooks that accepted before
    /// a veto are told to forget the node, or to restore its previous record when the
    /// `node_id` was already registered. Re-registering a known `node_id` replaces its record
    /// and does not consume extra capacity.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidInput`] for an empty `node_id`.
    pub fn register_node(
        &self,
        req: RegisterNodeRequest,
    ) -> Result<RegisterNodeResponse, DomainError> {
        if req.node_id.trim().is_empty() {
            return Err(DomainError::InvalidInput("node_id must not be empty".to_owned()));
        }

        let hooks = self.hooks();
        let mut nodes = self.nodes.write();

        if !nodes.contains(&req.node_id) && nodes.len() >= self.config.max_nodes {
            tracing::info!(node_id = %req.node_id, max_nodes = self.config.max_nodes, "Registration rejected: pool is full");
            return Ok(RegisterNodeResponse::rejected(format!(
                "Maximum number of nodes ({}) reached",
                self.config.max_nodes
            )));
        }

        if !self.config.org_allowed(&req.org) {
            tracing::info!(node_id = %req.node_id, org = %req.org, "Registration rejected: organization not allowed");
            return Ok(RegisterNodeResponse::rejected(format!(
                "Organization {} not allowed in this private pool",
                req.org
            )));
        }

        let metadata = NodeMetadata {
            node_id: req.node_id.clone(),
            specialization: req.specialization.clone(),
            endpoint: req.endpoint.clone(),
            org: req.org.clone(),
            private_node: req.private_node,
        };
        for (i, (plugin, hook)) in hooks.iter().enumerate() {
            if let Err(e) = hook.on_node_register(&req.node_id, &metadata) {
                tracing::info!(node_id = %req.node_id, plugin = %plugin, reason = %e, "Registration vetoed by hook");
                let previous = nodes.get(&req.node_id).map(node_metadata);
                roll_back_hooks(&hooks[..i], &req.node_id, previous.as_ref());
                return Ok(RegisterNodeResponse::rejected(e.to_string()));
            }
        }

        let now = Utc::now();
        let replaced = nodes
            .upsert(Node {
                node_id: req.node_id,
                specialization: req.specialization,
                endpoint: req.endpoint,
                org: req.org,
                private_node: req.private_node,
                status: NodeStatus::Healthy,
                registered_at: now,
                last_heartbeat_at: now,
                missed_heartbeats: 0,
            })
            .is_some();
        drop(nodes);

        tracing::info!(
            node_id = %metadata.node_id,
            specialization = %metadata.specialization,
            org = %metadata.org,
            replaced,
            "Registered node"
        );
        self.publish(
            Event::new(EVENT_NODE_REGISTERED)
                .with("node_id", metadata.node_id)
                .with("specialization", metadata.specialization)
                .with("org", metadata.org),
        );
        Ok(RegisterNodeResponse::accepted())
    }

    /// Refresh a node's liveness. Unknown ids get `alive = false` and change nothing.
    pub fn heartbeat(&self, req: &HeartbeatRequest) -> HeartbeatResponse {
        let hooks = self.hooks();
        let mut nodes = self.nodes.write();

        let Some(node) = nodes.get_mut(&req.node_id) else {
            tracing::debug!(node_id = %req.node_id, "Heartbeat from unregistered node");
            return HeartbeatResponse::unknown_node();
        };
        node.missed_heartbeats = 0;
        node.status = NodeStatus::Healthy;
        node.last_heartbeat_at = Utc::now();

        for (plugin, hook) in &hooks {
            if let Err(e) = hook.on_node_heartbeat(&req.node_id) {
                tracing::warn!(node_id = %req.node_id, plugin = %plugin, error = %e, "Heartbeat hook failed");
            }
        }
        drop(nodes);

        tracing::trace!(node_id = %req.node_id, "Heartbeat acknowledged");
        self.publish(Event::new(EVENT_NODE_HEARTBEAT).with("node_id", req.node_id.as_str()));
        HeartbeatResponse::acknowledged()
    }

    /// Healthy nodes matching both filters, ordered by `node_id`.
    #[must_use]
    pub fn list_nodes(&self, req: &ListNodesRequest) -> Vec<Node> {
        let filter = NodeFilter::new(req.specialization.as_deref(), req.org.as_deref());
        let hooks = self.hooks();
        let nodes = self.nodes.read();

        for (plugin, hook) in &hooks {
            if let Err(e) = hook.on_node_list(&filter) {
                tracing::warn!(plugin = %plugin, error = %e, "List hook failed");
            }
        }

        nodes
            .iter()
            .filter(|n| n.is_healthy() && filter.matches(&n.specialization, &n.org))
            .cloned()
            .collect()
    }

    /// # Errors
    /// Returns [`DomainError::NodeNotFound`] for unknown ids.
    pub fn get_node(&self, node_id: &str) -> Result<Node, DomainError> {
        self.nodes
            .read()
            .get(node_id)
            .cloned()
            .ok_or_else(|| DomainError::NodeNotFound(node_id.to_owned()))
    }

    /// Registered nodes, healthy or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// One health sweep. Returns the ids removed by this sweep.
    ///
    /// Every node's missed-heartbeat counter is incremented first and then compared, so a
    /// node that stays silent is removed on the `auto_deregister_after`-th sweep.
    pub fn check_node_health(&self) -> Vec<String> {
        let deregister_after = self.config.auto_deregister_after;
        let unhealthy_after = self.config.unhealthy_after;
        let hooks = self.hooks();
        let mut nodes = self.nodes.write();

        let mut expired = Vec::new();
        for node in nodes.iter_mut() {
            node.missed_heartbeats = node.missed_heartbeats.saturating_add(1);
            if node.missed_heartbeats >= deregister_after {
                expired.push(node.node_id.clone());
            } else if node.missed_heartbeats >= unhealthy_after && node.is_healthy() {
                node.status = NodeStatus::Unhealthy;
                tracing::warn!(node_id = %node.node_id, missed = node.missed_heartbeats, "Node marked unhealthy");
            }
        }

        for node_id in &expired {
            for (plugin, hook) in &hooks {
                if let Err(e) = hook.on_node_deregister(node_id) {
                    tracing::warn!(node_id = %node_id, plugin = %plugin, error = %e, "Deregister hook failed");
                }
            }
            nodes.remove(node_id);
            tracing::warn!(node_id = %node_id, missed = deregister_after, "Deregistered unresponsive node");
        }
        drop(nodes);

        for node_id in &expired {
            self.publish(Event::new(EVENT_NODE_DEREGISTERED).with("node_id", node_id.as_str()));
        }
        expired
    }

    /// Run [`Self::check_node_health`] every configured interval until `cancel` fires.
    pub async fn run_health_loop(&self, cancel: CancellationToken) {
        let period = self.config.health_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = %humantime::format_duration(period), "Health check loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.check_node_health();
                    if !removed.is_empty() {
                        tracing::info!(removed = removed.len(), remaining = self.node_count(), "Health sweep removed nodes");
                    }
                }
            }
        }
        tracing::info!("Health check loop stopped");
    }

    /// Enabled hooks in configured order. Missing plugins and plugins without the
    /// registry-hook capability are skipped.
    fn hooks(&self) -> Hooks {
        self.config
            .hooks
            .iter()
            .filter(|h| h.enabled)
            .filter_map(|h| match self.plugins.get_as::<dyn RegistryHook>(&h.name) {
                Ok(Some(hook)) => Some((h.name.clone(), hook)),
                Ok(None) => {
                    tracing::debug!(plugin = %h.name, "Configured hook is not a registry hook, skipping");
                    None
                }
                Err(e) => {
                    tracing::debug!(plugin = %h.name, error = %e, "Configured hook not loaded, skipping");
                    None
                }
            })
            .collect()
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.dispatch(event);
        }
    }
}

fn node_metadata(node: &Node) -> NodeMetadata {
    NodeMetadata {
        node_id: node.node_id.clone(),
        specialization: node.specialization.clone(),
        endpoint: node.endpoint.clone(),
        org: node.org.clone(),
        private_node: node.private_node,
    }
}

/// Undo the effect of `on_node_register` on hooks that accepted a registration which a later
/// hook vetoed.
fn roll_back_hooks(
    accepted: &[(String, Arc<dyn RegistryHook>)],
    node_id: &str,
    previous: Option<&NodeMetadata>,
) {
    for (plugin, hook) in accepted.iter().rev() {
        let result = match previous {
            Some(metadata) => hook.on_node_register(node_id, metadata),
            None => hook.on_node_deregister(node_id),
        };
        if let Err(e) = result {
            tracing::warn!(node_id = %node_id, plugin = %plugin, error = %e, "Failed to roll back registry hook");
        }
    }
}
