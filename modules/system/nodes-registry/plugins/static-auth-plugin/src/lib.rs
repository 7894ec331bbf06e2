//! Static Auth Plugin
//!
//! Authenticates bearer tokens against a fixed table and authorizes users from a
//! per-user grant list. Useful for testing, development, and small private pools.
//!
//! ## Configuration
//!
//! ```yaml
//! plugins:
//!   - name: auth
//!     kind: static-auth
//!     config:
//!       tokens:
//!         s3cr3t: operator
//!         r34d0nly: viewer
//!       grants:
//!         operator: ["*"]
//!         viewer: ["nodes:read", "pool:read"]
//!       public_paths: ["/pool/stats"]
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod plugin;

pub use config::StaticAuthConfig;
pub use plugin::{PLUGIN_KIND, StaticAuthPlugin};
