//! Static Federation Plugin
//!
//! Federation backend for development and tests: peers come from configuration, the
//! main-net registration is recorded in memory and payments are checked against a
//! configured ledger.
//!
//! ```yaml
//! plugins:
//!   - name: federation
//!     kind: static-federation
//!     config:
//!       staker_reward_percentage: 70
//!       payments:
//!         node-1: GACCOUNT1
//!       peers:
//!         - domain: eu.pool.example.net
//!           address: eu.pool.example.net:50051
//!           public: true
//!           max_nodes: 200
//!           location: { region: eu-central }
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod plugin;

pub use config::StaticFederationConfig;
pub use plugin::{MainNetRecord, PLUGIN_KIND, RewardPayout, StaticFederationPlugin};
