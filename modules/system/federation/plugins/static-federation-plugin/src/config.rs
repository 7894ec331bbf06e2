use poolkit::plugins::PoolMetadata;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticFederationConfig {
    /// Pools returned by discovery.
    pub peers: Vec<PoolMetadata>,

    /// Node id to the account that paid its registration.
    pub payments: BTreeMap<String, String>,

    /// Share of collected fees paid out to stakers, in percent (0..=100).
    pub staker_reward_percentage: u8,
}

impl Default for StaticFederationConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            payments: BTreeMap::new(),
            staker_reward_percentage: 70,
        }
    }
}
