//! Name-keyed service locator.
//!
//! Components publish shared instances under a well-known name (`plugin_manager`,
//! `nodes_registry`, ...) and consumers fetch them back by name and interface type.
//!
//! Implementation details:
//! - Value = `Arc<T>` stored as `Box<dyn Any + Send + Sync>` (downcast on read).
//!   `T` may be a trait object such as `dyn NodesRegistryClient`.
//! - The registered type name is kept next to the value so mismatches report both sides.
//! - A second `register` under the same name is an error.

use parking_lot::RwLock;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("service '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("service '{name}' not found")]
    NotFound { name: String },

    #[error("service '{name}' is a {registered}, not a {requested}")]
    TypeMismatch {
        name: String,
        registered: &'static str,
        requested: &'static str,
    },
}

struct Slot {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

/// Registry of shared services keyed by name.
pub struct ServiceContainer {
    slots: RwLock<HashMap<String, Slot>>,
}

impl ServiceContainer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Register `service` under `name`.
    ///
    /// # Errors
    /// Returns [`ContainerError::AlreadyRegistered`] if the name is taken.
    pub fn register<T>(
        &self,
        name: impl Into<String>,
        service: Arc<T>,
    ) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = name.into();
        let mut slots = self.slots.write();
        if slots.contains_key(&name) {
            return Err(ContainerError::AlreadyRegistered { name });
        }
        tracing::debug!(service = %name, r#type = type_name::<T>(), "Service registered");
        slots.insert(
            name,
            Slot {
                type_name: type_name::<T>(),
                value: Box::new(service),
            },
        );
        Ok(())
    }

    /// Fetch the service registered under `name` as `Arc<T>`.
    ///
    /// # Errors
    /// Returns [`ContainerError::NotFound`] for unknown names and
    /// [`ContainerError::TypeMismatch`] when `T` differs from the registered type.
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let slots = self.slots.read();
        let slot = slots.get(name).ok_or_else(|| ContainerError::NotFound {
            name: name.to_owned(),
        })?;

        slot.value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| ContainerError::TypeMismatch {
                name: name.to_owned(),
                registered: slot.type_name,
                requested: type_name::<T>(),
            })
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Remove a service; returns `true` if something was removed.
    /// `Arc`s already handed out stay valid.
    pub fn remove(&self, name: &str) -> bool {
        self.slots.write().remove(name).is_some()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.read().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_owned()
        }
    }

    #[test]
    fn register_and_get_trait_object() {
        let container = ServiceContainer::new();
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        container
            .register::<dyn Greeter>("greeter", greeter.clone())
            .unwrap();

        let got = container.get::<dyn Greeter>("greeter").unwrap();
        assert_eq!(got.greet(), "hello");
        assert!(Arc::ptr_eq(&greeter, &got), "Same instance should come back");
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let container = ServiceContainer::new();
        container.register("counter", Arc::new(1_u32)).unwrap();

        let err = container.register("counter", Arc::new(2_u32)).unwrap_err();
        assert!(matches!(err, ContainerError::AlreadyRegistered { ref name } if name == "counter"));
        assert_eq!(*container.get::<u32>("counter").unwrap(), 1, "First value is kept");
    }

    #[test]
    fn get_unknown_name_is_not_found() {
        let container = ServiceContainer::new();
        let err = container.get::<u32>("missing").unwrap_err();
        assert!(matches!(err, ContainerError::NotFound { .. }));
        assert_eq!(err.to_string(), "service 'missing' not found");
    }

    #[test]
    fn get_with_wrong_type_reports_both_types() {
        let container = ServiceContainer::new();
        container.register("value", Arc::new(7_u32)).unwrap();

        match container.get::<String>("value") {
            Err(ContainerError::TypeMismatch {
                registered,
                requested,
                ..
            }) => {
                assert!(registered.contains("u32"));
                assert!(requested.contains("String"));
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn has_remove_and_names() {
        let container = ServiceContainer::new();
        container.register("b", Arc::new(())).unwrap();
        container.register("a", Arc::new(())).unwrap();

        assert!(container.has("a"));
        assert_eq!(container.names(), vec!["a", "b"]);
        assert_eq!(container.len(), 2);

        assert!(container.remove("a"));
        assert!(!container.remove("a"));
        assert!(!container.has("a"));
        assert_eq!(container.names(), vec!["b"]);

        container.register("a", Arc::new(())).unwrap();
        assert_eq!(container.len(), 2, "Name is reusable after removal");
    }
}
