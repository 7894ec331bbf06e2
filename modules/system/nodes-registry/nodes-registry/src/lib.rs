//! Nodes Registry Module
//!
//! Admission and liveness tracking for the compute nodes of a pool.
//!
//! - Nodes register with a specialization, endpoint and organization. Admission is bounded
//!   by `max_nodes`, can be restricted to an organization allow-list, and can be vetoed by
//!   configured `RegistryHook` plugins.
//! - Nodes send heartbeats. A periodic sweep counts missed heartbeats, marks quiet nodes
//!   unhealthy and removes nodes that stay silent for `auto_deregister_after` sweeps.
//! - Only healthy nodes are returned by listings.
//!
//! ```yaml
//! modules:
//!   nodes_registry:
//!     config:
//!       max_nodes: 100
//!       health_check_interval: 30s
//!       auto_deregister_after: 3
//!       allow_public_registration: false
//!       allowed_orgs: [acme]
//!       hooks:
//!         - name: quota
//!         - name: metrics
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === MODULE DEFINITION ===
pub mod module;
pub use module::{MODULE_NAME, RegistryModule};

pub mod config;
pub use config::NodesRegistryConfig;

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
