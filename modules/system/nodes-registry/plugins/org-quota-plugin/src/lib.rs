//! Organization Quota Plugin
//!
//! Registry hook that caps how many nodes each organization may have in the pool.
//! Registrations beyond the cap are vetoed with a message naming the organization.
//!
//! ```yaml
//! plugins:
//!   - name: quota
//!     kind: org-quota
//!     config:
//!       default_quota: 10
//!       quotas:
//!         acme: 50
//!         hobbyists: 2
//! modules:
//!   nodes_registry:
//!     config:
//!       hooks:
//!         - name: quota
//! ```
//!
//! The hook reserves a slot when it approves a registration. When a later hook vetoes the
//! same registration the registry deregisters the node from this hook again, which frees
//! the slot.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod plugin;

pub use config::OrgQuotaConfig;
pub use plugin::{OrgQuotaPlugin, PLUGIN_KIND};
