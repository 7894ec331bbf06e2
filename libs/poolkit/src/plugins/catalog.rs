//! Compiled-in plugin factories.
//!
//! Plugin crates announce themselves with
//!
//! ```ignore
//! inventory::submit! {
//!     poolkit::plugins::PluginFactory::new("org-quota", "Per-organization node quotas", construct)
//! }
//! ```
//!
//! and the server binary links them in (`use org_quota_plugin as _;`). Tests usually build a
//! catalog explicitly with [`PluginCatalog::with_factory`] instead of relying on link-time
//! registration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Plugin;

/// Named constructor for one plugin kind.
#[derive(Clone, Copy)]
pub struct PluginFactory {
    pub kind: &'static str,
    pub description: &'static str,
    pub construct: fn() -> Arc<dyn Plugin>,
}

impl PluginFactory {
    #[must_use]
    pub const fn new(
        kind: &'static str,
        description: &'static str,
        construct: fn() -> Arc<dyn Plugin>,
    ) -> Self {
        Self {
            kind,
            description,
            construct,
        }
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

inventory::collect!(PluginFactory);

/// Lookup table of plugin factories by kind.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<&'static str, PluginFactory>,
}

impl PluginCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every factory submitted through `inventory` in the linked binary.
    /// On duplicate kinds the first one seen wins.
    #[must_use]
    pub fn from_inventory() -> Self {
        let mut catalog = Self::new();
        for factory in inventory::iter::<PluginFactory> {
            if catalog.factories.contains_key(factory.kind) {
                tracing::warn!(kind = factory.kind, "Duplicate plugin factory ignored");
                continue;
            }
            catalog.factories.insert(factory.kind, *factory);
        }
        tracing::debug!(kinds = ?catalog.kinds(), "Plugin catalog built");
        catalog
    }

    /// Add (or replace) a factory.
    #[must_use]
    pub fn with_factory(mut self, factory: PluginFactory) -> Self {
        self.factories.insert(factory.kind, factory);
        self
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&PluginFactory> {
        self.factories.get(kind)
    }

    /// Known kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
