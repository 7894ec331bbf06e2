//! Federation Module
//!
//! Connects the pool to the main net through the first loaded plugin exposing the
//! federation capability: registers the pool, discovers peer pools and keeps in sync
//! with them on a fixed interval.
//!
//! ```yaml
//! modules:
//!   federation:
//!     config:
//!       registry_address: https://main.example.net
//!       domain: pool.example.net
//!       public: true
//!       sync_interval: 5m
//!       plugin: federation
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod module;

pub use config::FederationConfig;
pub use coordinator::Coordinator;
pub use error::FederationError;
pub use module::{FederationModule, MODULE_NAME};
