use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use nodes_registry_sdk::{NODES_REGISTRY_CLIENT, NodesRegistryClient};
use poolkit::plugins::PoolMetadata;
use poolkit::{Module, PLUGIN_MANAGER_SERVICE, PluginManager, Unit, UnitCtx};

use crate::config::FederationConfig;
use crate::coordinator::Coordinator;

pub const MODULE_NAME: &str = "federation";

struct Running {
    cancel: CancellationToken,
    sync_loop: JoinHandle<()>,
}

/// Federation Module
///
/// Selects the federation plugin, attempts main-net registration and runs the peer
/// sync loop. A failed registration does not fail the module; the sync loop retries it.
/// The coordinator is published in the container as `federation`.
pub struct FederationModule {
    config: FederationConfig,
    pool: PoolMetadata,
    dependencies: Vec<String>,
    coordinator: ArcSwapOption<Coordinator>,
    running: Mutex<Option<Running>>,
}

impl FederationModule {
    /// `pool` carries the address, location and capacity advertised to the main net.
    #[must_use]
    pub fn new(config: FederationConfig, pool: PoolMetadata) -> Self {
        Self {
            config,
            pool,
            dependencies: Vec::new(),
            coordinator: ArcSwapOption::empty(),
            running: Mutex::new(None),
        }
    }

    /// Start only after `module` is running.
    #[must_use]
    pub fn after(mut self, module: impl Into<String>) -> Self {
        self.dependencies.push(module.into());
        self
    }

    #[must_use]
    pub fn coordinator(&self) -> Option<Arc<Coordinator>> {
        self.coordinator.load_full()
    }
}

#[async_trait]
impl Unit for FederationModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn start(&self, ctx: &UnitCtx) -> Result<()> {
        let plugins: Arc<PluginManager> = ctx
            .container()
            .get(PLUGIN_MANAGER_SERVICE)
            .context("federation requires the plugin manager")?;

        let mut coordinator = Coordinator::new(self.config.clone(), self.pool.clone(), plugins);
        if let Ok(registry) = ctx
            .container()
            .get::<dyn NodesRegistryClient>(NODES_REGISTRY_CLIENT)
        {
            coordinator = coordinator.with_registry(registry);
        }
        coordinator.initialize()?;
        let coordinator = Arc::new(coordinator);

        if let Err(e) = coordinator.register_with_main_net().await {
            tracing::warn!(error = %e, "Main net registration failed; will retry on sync");
        }

        ctx.container().register(MODULE_NAME, Arc::clone(&coordinator))?;

        let cancel = ctx.cancellation_token().child_token();
        let sync_loop = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            let cancel = cancel.clone();
            let period = self.config.sync_period();
            async move { coordinator.run_sync_loop(cancel, period).await }
        });

        self.coordinator.store(Some(coordinator));
        *self.running.lock() = Some(Running { cancel, sync_loop });
        tracing::info!("Federation module started");
        Ok(())
    }

    async fn stop(&self, ctx: &UnitCtx) -> Result<()> {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.sync_loop.await {
                tracing::warn!(error = %e, "Federation sync loop ended abnormally");
            }
        }
        ctx.container().remove(MODULE_NAME);
        self.coordinator.store(None);
        tracing::info!("Federation module stopped");
        Ok(())
    }
}

impl Module for FederationModule {
    fn description(&self) -> &str {
        "Main-net registration and peer pool synchronization"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }
}
