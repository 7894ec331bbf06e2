//! Dependency-ordered lifecycle of services and modules.
//!
//! Both families share one engine, [`Orchestrator`], parameterized by the unit trait
//! object (`dyn Service` or `dyn Module`). A unit declares its dependencies by name at
//! registration; the orchestrator keeps a start order (dependencies first) that is
//! recomputed on every registration, and stops units in the exact reverse of it.
//!
//! ```text
//! Stopped ──start──▶ Starting ──ok──▶ Running ──stop──▶ Stopping ──ok──▶ Stopped
//!                       │                                  │
//!                       └──err──▶ Failed ◀──────err────────┘
//! ```
//!
//! `Failed` units are never retried automatically. An explicit `start_all`/`start_one`
//! treats them like `Stopped`.

mod error;
mod order;
mod orchestrator;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::container::ServiceContainer;
use crate::event::EventDispatcher;

pub use error::LifecycleError;
pub use orchestrator::Orchestrator;

pub type ServiceManager = Orchestrator<dyn Service>;
pub type ModuleManager = Orchestrator<dyn Module>;

/// Shared handles every unit receives on start and stop.
#[derive(Clone, Debug)]
pub struct UnitCtx {
    container: Arc<ServiceContainer>,
    dispatcher: Arc<EventDispatcher>,
    cancel: CancellationToken,
}

impl UnitCtx {
    #[must_use]
    pub fn new(
        container: Arc<ServiceContainer>,
        dispatcher: Arc<EventDispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            container,
            dispatcher,
            cancel,
        }
    }

    #[must_use]
    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Root cancellation token; background tasks should use a child of it.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for UnitCtx {
    fn default() -> Self {
        Self::new(
            Arc::new(ServiceContainer::new()),
            Arc::new(EventDispatcher::new()),
            CancellationToken::new(),
        )
    }
}

/// Common contract of lifecycle units.
#[async_trait]
pub trait Unit: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Names of units that must be running before this one starts.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    async fn start(&self, ctx: &UnitCtx) -> anyhow::Result<()>;

    async fn stop(&self, ctx: &UnitCtx) -> anyhow::Result<()>;
}

/// A long-running service.
pub trait Service: Unit {}

/// A loadable feature module with descriptive metadata.
pub trait Module: Unit {
    fn description(&self) -> &str {
        ""
    }

    fn version(&self) -> &str {
        "0.0.0"
    }
}

/// Family tag: decides the event prefix (`service.started`, `module.failed`, ...).
pub trait UnitKind: Unit {
    const KIND: &'static str;
}

impl UnitKind for dyn Service {
    const KIND: &'static str = "service";
}

impl UnitKind for dyn Module {
    const KIND: &'static str = "module";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl UnitState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
