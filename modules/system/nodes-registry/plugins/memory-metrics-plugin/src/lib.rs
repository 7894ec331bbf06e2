//! In-memory metrics plugin.
//!
//! Accumulates metric values in process memory and doubles as a registry hook that
//! counts registrations, heartbeats, listings and deregistrations.
//!
//! ```yaml
//! plugins:
//!   - name: metrics
//!     kind: memory-metrics
//!     config:
//!       prefix: pool_
//! modules:
//!   nodes_registry:
//!     config:
//!       hooks:
//!         - name: metrics
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod plugin;

pub use config::MemoryMetricsConfig;
pub use plugin::{MemoryMetricsPlugin, PLUGIN_KIND, metric_key};
