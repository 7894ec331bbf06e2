use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use nodes_registry_sdk::{NODES_REGISTRY_CLIENT, NodesRegistryClient};
use poolkit::{Event, Module, PLUGIN_MANAGER_SERVICE, PluginManager, SubscriptionId, Unit, UnitCtx};

use crate::config::NodesRegistryConfig;
use crate::domain::local_client::NodesRegistryLocalClient;
use crate::domain::service::{EVENT_NODE_HEARTBEAT, EVENT_NODE_REGISTERED, Service};

pub const MODULE_NAME: &str = "nodes_registry";

/// Handles owned while the module is running.
struct Running {
    cancel: CancellationToken,
    health_loop: JoinHandle<()>,
    subscriptions: Vec<SubscriptionId>,
}

/// Nodes Registry Module
///
/// On start it:
/// - resolves the plugin manager from the container,
/// - publishes the registry service (`nodes_registry`) and its client
///   (`nodes_registry_client`),
/// - logs node events,
/// - runs the periodic health sweep until stopped.
pub struct RegistryModule {
    config: NodesRegistryConfig,
    service: ArcSwapOption<Service>,
    running: Mutex<Option<Running>>,
}

impl RegistryModule {
    #[must_use]
    pub fn new(config: NodesRegistryConfig) -> Self {
        Self {
            config,
            service: ArcSwapOption::empty(),
            running: Mutex::new(None),
        }
    }

    /// The live registry service; `None` until the module has started.
    #[must_use]
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.load_full()
    }
}

#[async_trait]
impl Unit for RegistryModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    async fn start(&self, ctx: &UnitCtx) -> Result<()> {
        let plugins: Arc<PluginManager> = ctx
            .container()
            .get(PLUGIN_MANAGER_SERVICE)
            .context("nodes registry requires the plugin manager")?;

        let service = Arc::new(
            Service::new(self.config.clone(), plugins).with_events(Arc::clone(ctx.dispatcher())),
        );

        let container = ctx.container();
        container.register(MODULE_NAME, Arc::clone(&service))?;
        let client: Arc<dyn NodesRegistryClient> =
            Arc::new(NodesRegistryLocalClient::new(Arc::clone(&service)));
        if let Err(e) = container.register(NODES_REGISTRY_CLIENT, client) {
            container.remove(MODULE_NAME);
            return Err(e.into());
        }

        let dispatcher = ctx.dispatcher();
        let subscriptions = vec![
            dispatcher.subscribe(EVENT_NODE_REGISTERED, |e: &Event| {
                tracing::debug!(
                    node_id = e.str_field("node_id").unwrap_or_default(),
                    specialization = e.str_field("specialization").unwrap_or_default(),
                    "Node registered event"
                );
            }),
            dispatcher.subscribe(EVENT_NODE_HEARTBEAT, |e: &Event| {
                tracing::trace!(
                    node_id = e.str_field("node_id").unwrap_or_default(),
                    "Node heartbeat event"
                );
            }),
        ];

        let cancel = ctx.cancellation_token().child_token();
        let health_loop = tokio::spawn({
            let service = Arc::clone(&service);
            let cancel = cancel.clone();
            async move { service.run_health_loop(cancel).await }
        });

        self.service.store(Some(service));
        *self.running.lock() = Some(Running {
            cancel,
            health_loop,
            subscriptions,
        });

        tracing::info!(
            max_nodes = self.config.max_nodes,
            hooks = self.config.hooks.len(),
            "Nodes registry module started"
        );
        Ok(())
    }

    async fn stop(&self, ctx: &UnitCtx) -> Result<()> {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.health_loop.await {
                tracing::warn!(error = %e, "Health check loop ended abnormally");
            }
            for id in running.subscriptions {
                ctx.dispatcher().unsubscribe(id);
            }
        }

        ctx.container().remove(NODES_REGISTRY_CLIENT);
        ctx.container().remove(MODULE_NAME);
        self.service.store(None);

        tracing::info!("Nodes registry module stopped");
        Ok(())
    }
}

impl Module for RegistryModule {
    fn description(&self) -> &str {
        "Node admission, heartbeat tracking and health sweeping"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }
}
