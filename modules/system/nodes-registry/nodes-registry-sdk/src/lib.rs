#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

pub use api::{NODES_REGISTRY_CLIENT, NodesRegistryClient};
pub use error::NodesRegistryError;
pub use models::{
    HeartbeatRequest, HeartbeatResponse, ListNodesRequest, ListNodesResponse, Node, NodeStatus,
    RegisterNodeRequest, RegisterNodeResponse,
};
