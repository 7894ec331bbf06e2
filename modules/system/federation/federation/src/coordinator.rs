//! Pool-side view of the federation.
//!
//! The coordinator owns no network code; every operation goes through the selected
//! federation plugin. It remembers whether the pool is registered, the last discovered
//! peers and when the last successful sync happened.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use nodes_registry_sdk::NodesRegistryClient;
use poolkit::PluginManager;
use poolkit::plugins::{FederationPlugin, PoolFilter, PoolMetadata};

use crate::config::{DEFAULT_SYNC_INTERVAL, FederationConfig};
use crate::error::FederationError;

type SelectedPlugin = (String, Arc<dyn FederationPlugin>);

#[derive(Default)]
struct State {
    plugin: Option<SelectedPlugin>,
    registered: bool,
    last_sync: Option<DateTime<Utc>>,
    peers: Vec<PoolMetadata>,
}

pub struct Coordinator {
    config: FederationConfig,
    pool: PoolMetadata,
    plugins: Arc<PluginManager>,
    registry: Option<Arc<dyn NodesRegistryClient>>,
    state: RwLock<State>,
    registration: tokio::sync::Mutex<()>,
}

impl Coordinator {
    /// `pool` describes this pool; its `domain` and `public` flag are overridden by `config`.
    #[must_use]
    pub fn new(
        config: FederationConfig,
        mut pool: PoolMetadata,
        plugins: Arc<PluginManager>,
    ) -> Self {
        pool.domain.clone_from(&config.domain);
        pool.public = config.public;
        Self {
            config,
            pool,
            plugins,
            registry: None,
            state: RwLock::new(State::default()),
            registration: tokio::sync::Mutex::new(()),
        }
    }

    /// Report the live node count when registering.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn NodesRegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Select the federation plugin: the configured one, or else the first loaded plugin
    /// offering the capability.
    ///
    /// # Errors
    /// [`FederationError::PluginUnavailable`] when the configured plugin is missing or
    /// lacks the capability, [`FederationError::NoPlugin`] when nothing qualifies.
    pub fn initialize(&self) -> Result<(), FederationError> {
        let selected = match &self.config.plugin {
            Some(name) => match self.plugins.get_as::<dyn FederationPlugin>(name) {
                Ok(Some(plugin)) => (name.clone(), plugin),
                Ok(None) | Err(_) => {
                    return Err(FederationError::PluginUnavailable { name: name.clone() });
                }
            },
            None => self
                .plugins
                .with_capability::<dyn FederationPlugin>()
                .into_iter()
                .next()
                .ok_or(FederationError::NoPlugin)?,
        };

        tracing::info!(plugin = %selected.0, "Federation plugin selected");
        self.state.write().plugin = Some(selected);
        Ok(())
    }

    fn plugin(&self) -> Result<Arc<dyn FederationPlugin>, FederationError> {
        self.state
            .read()
            .plugin
            .as_ref()
            .map(|(_, p)| Arc::clone(p))
            .ok_or(FederationError::NotInitialized)
    }

    /// Register the pool with the main net. Calling it again after success is a no-op.
    ///
    /// # Errors
    /// [`FederationError::NotInitialized`] before [`Self::initialize`], or
    /// [`FederationError::Registration`] when the plugin fails.
    pub async fn register_with_main_net(&self) -> Result<(), FederationError> {
        let plugin = self.plugin()?;
        let _guard = self.registration.lock().await;
        if self.is_registered() {
            tracing::debug!("Pool already registered with main net");
            return Ok(());
        }

        let mut pool = self.pool.clone();
        if let Some(registry) = &self.registry {
            match registry.node_count().await {
                Ok(count) => pool.node_count = Some(count),
                Err(e) => tracing::debug!(error = %e, "Node count unavailable for registration"),
            }
        }

        plugin
            .register_with_main_net(&self.config.registry_address, &pool)
            .await
            .map_err(FederationError::Registration)?;

        self.state.write().registered = true;
        tracing::info!(
            registry = %self.config.registry_address,
            domain = %pool.domain,
            "Pool registered with main net"
        );
        Ok(())
    }

    /// Discover pools through the plugin and remember them as the current peers.
    ///
    /// # Errors
    /// [`FederationError::NotInitialized`] or [`FederationError::Discovery`].
    pub async fn discover_pools(
        &self,
        filter: &PoolFilter,
    ) -> Result<Vec<PoolMetadata>, FederationError> {
        let plugin = self.plugin()?;
        let pools = plugin
            .discover_pools(filter)
            .await
            .map_err(FederationError::Discovery)?;
        self.state.write().peers.clone_from(&pools);
        tracing::debug!(pools = pools.len(), "Discovered pools");
        Ok(pools)
    }

    /// # Errors
    /// [`FederationError::NotInitialized`] or [`FederationError::Sync`].
    pub async fn sync_with_peers(&self) -> Result<(), FederationError> {
        let plugin = self.plugin()?;
        plugin.sync_with_peers().await.map_err(FederationError::Sync)?;
        let now = Utc::now();
        self.state.write().last_sync = Some(now);
        tracing::info!(at = %now.to_rfc3339(), "Synced with peer pools");
        Ok(())
    }

    /// # Errors
    /// [`FederationError::NotInitialized`] or the plugin's error.
    pub async fn verify_node_payment(
        &self,
        node_id: &str,
        account: &str,
    ) -> Result<bool, FederationError> {
        Ok(self.plugin()?.verify_node_payment(node_id, account).await?)
    }

    /// # Errors
    /// [`FederationError::NotInitialized`] or the plugin's error.
    pub async fn distribute_rewards(
        &self,
        total_fees: u64,
        accounts: &[String],
    ) -> Result<(), FederationError> {
        Ok(self.plugin()?.distribute_rewards(total_fees, accounts).await?)
    }

    /// Every `period`: register if still unregistered, then sync. Errors are logged and
    /// retried on the next tick. Returns when `cancel` fires. A zero `period` runs on
    /// [`DEFAULT_SYNC_INTERVAL`] instead.
    pub async fn run_sync_loop(&self, cancel: CancellationToken, period: Duration) {
        let period = if period.is_zero() {
            tracing::warn!("Zero federation sync period, using default of 5m");
            DEFAULT_SYNC_INTERVAL
        } else {
            period
        };
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = %humantime::format_duration(period), "Federation sync loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.is_registered()
                        && let Err(e) = self.register_with_main_net().await
                    {
                        tracing::warn!(error = %e, "Main net registration retry failed");
                    }
                    if let Err(e) = self.sync_with_peers().await {
                        tracing::warn!(error = %e, "Error syncing with peers");
                    }
                }
            }
        }
        tracing::info!("Federation sync loop stopped");
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state.read().registered
    }

    /// Peers from the last successful discovery.
    #[must_use]
    pub fn peer_pools(&self) -> Vec<PoolMetadata> {
        self.state.read().peers.clone()
    }

    #[must_use]
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_sync
    }

    /// Name of the selected plugin.
    #[must_use]
    pub fn plugin_name(&self) -> Option<String> {
        self.state.read().plugin.as_ref().map(|(name, _)| name.clone())
    }
}
