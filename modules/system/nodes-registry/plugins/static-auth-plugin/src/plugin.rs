use async_trait::async_trait;
use parking_lot::RwLock;
use poolkit::plugins::{
    AuthPlugin, Credentials, Plugin, PluginError, PluginFactory, PluginSettings, RequestInfo,
    parse_settings,
};
use std::sync::Arc;

use crate::config::StaticAuthConfig;

pub const PLUGIN_KIND: &str = "static-auth";

fn construct() -> Arc<dyn Plugin> {
    Arc::new(StaticAuthPlugin::new())
}

inventory::submit! {
    PluginFactory::new(PLUGIN_KIND, "Static bearer tokens and per-user grants", construct)
}

/// Auth plugin backed by the configured token table.
#[derive(Default)]
pub struct StaticAuthPlugin {
    config: RwLock<Option<StaticAuthConfig>>,
}

impl StaticAuthPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_config<T>(&self, f: impl FnOnce(&StaticAuthConfig) -> T) -> Result<T, PluginError> {
        self.config
            .read()
            .as_ref()
            .map(f)
            .ok_or_else(|| PluginError::NotInitialized {
                plugin: PLUGIN_KIND.to_owned(),
            })
    }
}

/// Resource and action a request maps to: `GET /nodes/n1` is `nodes:read`.
fn request_scope(request: &RequestInfo) -> (&str, &'static str) {
    let resource = request
        .path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default();
    let action = match request.method.as_str() {
        "GET" | "HEAD" | "OPTIONS" => "read",
        _ => "write",
    };
    (resource, action)
}

#[async_trait]
impl Plugin for StaticAuthPlugin {
    fn name(&self) -> &str {
        PLUGIN_KIND
    }

    async fn initialize(&self, settings: &PluginSettings) -> Result<(), PluginError> {
        let cfg: StaticAuthConfig = parse_settings(PLUGIN_KIND, settings)?;
        tracing::info!(
            tokens = cfg.tokens.len(),
            users = cfg.grants.len(),
            "Static auth plugin initialized"
        );
        *self.config.write() = Some(cfg);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.config.write().take();
        Ok(())
    }

    fn as_auth(self: Arc<Self>) -> Option<Arc<dyn AuthPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl AuthPlugin for StaticAuthPlugin {
    async fn authenticate(&self, credentials: &Credentials) -> Result<String, PluginError> {
        let token = credentials
            .get("token")
            .ok_or_else(|| PluginError::Unauthorized("missing token".to_owned()))?;
        self.with_config(|cfg| cfg.user_for_token(token).map(str::to_owned))?
            .ok_or_else(|| PluginError::Unauthorized("invalid token".to_owned()))
    }

    async fn authorize(
        &self,
        user_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, PluginError> {
        self.with_config(|cfg| cfg.is_granted(user_id, resource, action))
    }

    fn filter_request(&self, request: &RequestInfo) -> Result<(), PluginError> {
        let guard = self.config.read();
        let cfg = guard.as_ref().ok_or_else(|| PluginError::NotInitialized {
            plugin: PLUGIN_KIND.to_owned(),
        })?;

        if cfg.is_public(&request.path) {
            return Ok(());
        }

        let token = request
            .bearer_token()
            .ok_or_else(|| PluginError::Unauthorized("missing bearer token".to_owned()))?;
        let user = cfg
            .user_for_token(token)
            .ok_or_else(|| PluginError::Unauthorized("invalid token".to_owned()))?;

        let (resource, action) = request_scope(request);
        if cfg.is_granted(user, resource, action) {
            Ok(())
        } else {
            tracing::debug!(user = %user, resource = %resource, action = %action, "Request denied");
            Err(PluginError::Forbidden(format!(
                "{user} may not {action} {resource}"
            )))
        }
    }
}
