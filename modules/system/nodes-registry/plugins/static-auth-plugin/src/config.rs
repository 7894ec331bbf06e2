//! Configuration for the static auth plugin.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticAuthConfig {
    /// Bearer token to user id.
    pub tokens: BTreeMap<String, String>,

    /// User id to grants. A grant is `resource:action`; either side may be `*`, and a
    /// bare `*` grants everything.
    pub grants: BTreeMap<String, Vec<String>>,

    /// Path prefixes that bypass the request filter.
    pub public_paths: Vec<String>,
}

impl StaticAuthConfig {
    #[must_use]
    pub fn user_for_token(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    #[must_use]
    pub fn is_granted(&self, user_id: &str, resource: &str, action: &str) -> bool {
        self.grants.get(user_id).is_some_and(|grants| {
            grants.iter().any(|grant| grant_matches(grant, resource, action))
        })
    }
}

fn grant_matches(grant: &str, resource: &str, action: &str) -> bool {
    if grant == "*" {
        return true;
    }
    let Some((r, a)) = grant.split_once(':') else {
        return false;
    };
    (r == "*" || r == resource) && (a == "*" || a == action)
}
