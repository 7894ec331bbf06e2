//! In-memory storage plugin.
//!
//! A concurrent key-value map of JSON values, for development and single-process pools.
//! Contents do not survive a restart.
//!
//! ```yaml
//! plugins:
//!   - name: storage
//!     kind: memory-storage
//!     config:
//!       max_entries: 10000
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod plugin;

pub use config::MemoryStorageConfig;
pub use plugin::{MemoryStoragePlugin, PLUGIN_KIND};
