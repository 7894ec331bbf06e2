use nodes_registry_sdk::Node;
use std::collections::BTreeMap;

/// Node table keyed by `node_id`.
///
/// Not synchronized: the service owns it behind its lock so that admission checks,
/// hook calls and the mutation happen under one critical section.
#[derive(Debug, Default)]
pub struct NodeStorage {
    nodes: BTreeMap<String, Node>,
}

impl NodeStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous record for that id.
    pub fn upsert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.node_id.clone(), node)
    }

    #[must_use]
    pub fn get(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    #[must_use]
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn remove(&mut self, node_id: &str) -> Option<Node> {
        self.nodes.remove(node_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in `node_id` order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }
}
