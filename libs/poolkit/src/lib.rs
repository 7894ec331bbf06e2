//! PoolKit: the runtime kernel of the node pool server.
//!
//! - [`event`]: topic-based publish/subscribe between components.
//! - [`container`]: name-keyed locator for shared services.
//! - [`plugins`]: capability-typed plugin framework and compiled-in plugin catalog.
//! - [`lifecycle`]: dependency-ordered start/stop of services and modules.
//! - [`config`]: typed access to per-module configuration sections.
//! - [`build_info`]: immutable build metadata for version reporting.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod build_info;
pub mod config;
pub mod container;
pub mod event;
pub mod lifecycle;
pub mod plugins;

pub use build_info::BuildInfo;
pub use config::{
    ConfigError, ConfigProvider, module_config_or_default, module_config_required, module_enabled,
};
pub use container::{ContainerError, ServiceContainer};
pub use event::{Event, EventDispatcher, SubscriptionId};
pub use lifecycle::{
    LifecycleError, Module, ModuleManager, Orchestrator, Service, ServiceManager, Unit, UnitCtx,
    UnitState,
};
pub use plugins::{
    Capability, CapabilityKind, PLUGIN_MANAGER_SERVICE, PluginCatalog, PluginConfig, PluginError,
    PluginFactory, PluginManager, PluginSettings,
};
