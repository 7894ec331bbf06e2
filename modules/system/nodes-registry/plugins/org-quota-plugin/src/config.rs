use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrgQuotaConfig {
    /// Quota for organizations not listed in `quotas`; unlimited when absent.
    pub default_quota: Option<usize>,

    /// Per-organization quotas.
    pub quotas: BTreeMap<String, usize>,
}

impl OrgQuotaConfig {
    #[must_use]
    pub fn quota_for(&self, org: &str) -> Option<usize> {
        self.quotas.get(org).copied().or(self.default_quota)
    }
}
