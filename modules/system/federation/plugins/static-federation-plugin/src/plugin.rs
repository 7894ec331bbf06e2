use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use poolkit::plugins::{
    FederationPlugin, Plugin, PluginError, PluginFactory, PluginSettings, PoolFilter,
    PoolMetadata, parse_settings,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::StaticFederationConfig;

pub const PLUGIN_KIND: &str = "static-federation";

fn construct() -> Arc<dyn Plugin> {
    Arc::new(StaticFederationPlugin::new())
}

inventory::submit! {
    PluginFactory::new(PLUGIN_KIND, "Configured peers and an in-memory main-net record", construct)
}

/// What the main net knows about this pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainNetRecord {
    pub registry_address: String,
    pub pool: PoolMetadata,
    pub registered_at: DateTime<Utc>,
}

/// Outcome of one reward distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardPayout {
    pub per_account: BTreeMap<String, u64>,
    /// Fees kept by the pool, including the rounding remainder.
    pub retained: u64,
}

#[derive(Default)]
struct State {
    config: Option<StaticFederationConfig>,
    main_net: Option<MainNetRecord>,
    syncs: u64,
    last_payout: Option<RewardPayout>,
}

#[derive(Default)]
pub struct StaticFederationPlugin {
    state: RwLock<State>,
}

impl StaticFederationPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn main_net_record(&self) -> Option<MainNetRecord> {
        self.state.read().main_net.clone()
    }

    #[must_use]
    pub fn sync_count(&self) -> u64 {
        self.state.read().syncs
    }

    #[must_use]
    pub fn last_payout(&self) -> Option<RewardPayout> {
        self.state.read().last_payout.clone()
    }

    fn not_initialized() -> PluginError {
        PluginError::NotInitialized {
            plugin: PLUGIN_KIND.to_owned(),
        }
    }
}

/// Split the stakers' share of `total_fees` evenly across `accounts`.
fn split_rewards(total_fees: u64, percentage: u8, accounts: &[String]) -> RewardPayout {
    let share = u128::from(total_fees) * u128::from(percentage.min(100)) / 100;
    let count = u128::try_from(accounts.len()).unwrap_or(u128::MAX);
    let per = u64::try_from(share / count.max(1)).unwrap_or(u64::MAX);
    let paid = per.saturating_mul(u64::try_from(accounts.len()).unwrap_or(u64::MAX));
    RewardPayout {
        per_account: accounts.iter().map(|a| (a.clone(), per)).collect(),
        retained: total_fees.saturating_sub(paid),
    }
}

#[async_trait]
impl Plugin for StaticFederationPlugin {
    fn name(&self) -> &str {
        PLUGIN_KIND
    }

    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError> {
        let cfg: StaticFederationConfig = parse_settings(PLUGIN_KIND, settings)?;
        if cfg.staker_reward_percentage > 100 {
            return Err(PluginError::InvalidConfig {
                plugin: PLUGIN_KIND.to_owned(),
                reason: "staker_reward_percentage must be at most 100".to_owned(),
            });
        }
        tracing::info!(peers = cfg.peers.len(), "Static federation plugin initialized");
        self.state.write().config = Some(cfg);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        *self.state.write() = State::default();
        Ok(())
    }

    fn as_federation(self: Arc<Self>) -> Option<Arc<dyn FederationPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl FederationPlugin for StaticFederationPlugin {
    async fn register_with_main_net(
        &self,
        registry_address: &str,
        pool: &PoolMetadata,
    ) -> Result<(), PluginError> {
        let mut state = self.state.write();
        if state.config.is_none() {
            return Err(Self::not_initialized());
        }
        if pool.domain.is_empty() {
            return Err(PluginError::rejected("pool domain is required for main net registration"));
        }
        state.main_net = Some(MainNetRecord {
            registry_address: registry_address.to_owned(),
            pool: pool.clone(),
            registered_at: Utc::now(),
        });
        tracing::info!(registry = %registry_address, domain = %pool.domain, "Recorded main net registration");
        Ok(())
    }

    /// Configured peers matching `filter`, excluding this pool's own domain.
    async fn discover_pools(&self, filter: &PoolFilter) -> Result<Vec<PoolMetadata>, PluginError> {
        let state = self.state.read();
        let cfg = state.config.as_ref().ok_or_else(Self::not_initialized)?;
        let own = state.main_net.as_ref().map(|r| r.pool.domain.as_str());
        Ok(cfg
            .peers
            .iter()
            .filter(|p| filter.matches(p) && Some(p.domain.as_str()) != own)
            .cloned()
            .collect())
    }

    async fn sync_with_peers(&self) -> Result<(), PluginError> {
        let mut state = self.state.write();
        if state.config.is_none() {
            return Err(Self::not_initialized());
        }
        state.syncs += 1;
        tracing::debug!(syncs = state.syncs, "Synced with static peers");
        Ok(())
    }

    async fn verify_node_payment(&self, node_id: &str, account: &str) -> Result<bool, PluginError> {
        let state = self.state.read();
        let cfg = state.config.as_ref().ok_or_else(Self::not_initialized)?;
        Ok(cfg.payments.get(node_id).is_some_and(|paid_by| paid_by == account))
    }

    async fn distribute_rewards(
        &self,
        total_fees: u64,
        accounts: &[String],
    ) -> Result<(), PluginError> {
        let mut state = self.state.write();
        let percentage = state
            .config
            .as_ref()
            .ok_or_else(Self::not_initialized)?
            .staker_reward_percentage;
        if accounts.is_empty() {
            return Err(PluginError::rejected("no accounts to reward"));
        }
        let payout = split_rewards(total_fees, percentage, accounts);
        tracing::info!(total_fees, accounts = accounts.len(), retained = payout.retained, "Distributed rewards");
        state.last_payout = Some(payout);
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use poolkit::plugins::PoolLocation;
    use serde_json::json;

    async fn plugin() -> StaticFederationPlugin {
        let plugin = StaticFederationPlugin::new();
        let serde_json::Value::Object(settings) = json!({
            "payments": {"n1": "GACC1"},
            "peers": [
                {"domain": "eu.pool", "address": "eu.pool:50051", "public": true, "max_nodes": 10,
                 "location": {"region": "eu"}},
                {"domain": "us.pool", "address": "us.pool:50051", "public": false, "max_nodes": 5,
                 "location": {"region": "us"}},
                {"domain": "self.pool", "address": "self.pool:50051", "public": true, "max_nodes": 5}
            ]
        }) else {
            unreachable!()
        };
        plugin.initialize(&settings).await.unwrap();
        plugin
    }

    fn own_pool() -> PoolMetadata {
        PoolMetadata {
            domain: "self.pool".to_owned(),
            address: "self.pool:50051".to_owned(),
            location: PoolLocation::default(),
            public: true,
            max_nodes: 5,
            node_count: Some(0),
        }
    }

    #[tokio::test]
    async fn discovery_filters_and_skips_own_pool() {
        let plugin = plugin().await;
        plugin.register_with_main_net("https://main", &own_pool()).await.unwrap();

        let all: Vec<String> = plugin
            .discover_pools(&PoolFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.domain)
            .collect();
        assert_eq!(all, vec!["eu.pool", "us.pool"]);

        let public = plugin
            .discover_pools(&PoolFilter {
                public_only: true,
                ..PoolFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].domain, "eu.pool");
    }

    #[tokio::test]
    async fn registration_is_recorded() {
        let plugin = plugin().await;
        plugin.register_with_main_net("https://main", &own_pool()).await.unwrap();
        let record = plugin.main_net_record().unwrap();
        assert_eq!(record.registry_address, "https://main");
        assert_eq!(record.pool.domain, "self.pool");

        let nameless = PoolMetadata::default();
        assert!(plugin.register_with_main_net("https://main", &nameless).await.is_err());
    }

    #[tokio::test]
    async fn payments_are_checked_against_ledger() {
        let plugin = plugin().await;
        assert!(plugin.verify_node_payment("n1", "GACC1").await.unwrap());
        assert!(!plugin.verify_node_payment("n1", "GOTHER").await.unwrap());
        assert!(!plugin.verify_node_payment("n2", "GACC1").await.unwrap());
    }

    #[tokio::test]
    async fn rewards_split_evenly_with_remainder_retained() {
        let plugin = plugin().await;
        let accounts = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        plugin.distribute_rewards(100, &accounts).await.unwrap();

        let payout = plugin.last_payout().unwrap();
        assert_eq!(payout.per_account["a"], 23);
        assert_eq!(payout.per_account.len(), 3);
        assert_eq!(payout.retained, 31);

        assert!(plugin.distribute_rewards(100, &[]).await.is_err());
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let plugin = StaticFederationPlugin::new();
        assert!(matches!(
            plugin.sync_with_peers().await,
            Err(PluginError::NotInitialized { .. })
        ));
        assert!(plugin.discover_pools(&PoolFilter::default()).await.is_err());
    }
}
