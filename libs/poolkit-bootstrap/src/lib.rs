//! Host-side bootstrap for the node pool server.
//!
//! Everything a binary needs before the kernel takes over: layered configuration
//! ([`config`]), the tracing subscriber ([`logging`]) and OS signal handling ([`signals`]).

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod logging;
pub mod signals;

pub use config::{AppConfig, ENV_PREFIX, LogFormat, LoggingConfig, ServerConfig};
pub use logging::init_logging;
pub use signals::{cancel_on_shutdown, wait_for_shutdown};
