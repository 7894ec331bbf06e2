//! Topic-based event dispatcher.
//!
//! Handlers subscribe to an exact topic name (`node.registered`, `service.started`, ...).
//! Publishing comes in two flavors:
//! - [`EventDispatcher::dispatch`] hands every handler its own tokio task and returns at once.
//! - [`EventDispatcher::dispatch_sync`] runs handlers inline, in subscription order.
//!
//! The subscriber table is snapshotted before handlers run, so a handler may subscribe or
//! unsubscribe without deadlocking the dispatcher.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Free-form event payload.
pub type EventData = Map<String, Value>;

/// Subscriber callback.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// A published event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub data: EventData,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time and an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: EventData::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a payload field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Read a string payload field.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Publish/subscribe hub keyed by topic name.
pub struct EventDispatcher {
    topics: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `handler` to `topic`.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let topic = topic.into();
        tracing::trace!(topic = %topic, subscription = id.0, "Subscribed to topic");
        self.topics
            .write()
            .entry(topic)
            .or_default()
            .push(Subscription {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove a single subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let mut removed = false;
        topics.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Drop every handler of `topic`. Returns how many were removed.
    pub fn unsubscribe_all(&self, topic: &str) -> usize {
        self.topics.write().remove(topic).map_or(0, |subs| subs.len())
    }

    #[must_use]
    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.topics
            .read()
            .get(topic)
            .is_some_and(|subs| !subs.is_empty())
    }

    fn handlers_for(&self, topic: &str) -> Vec<EventHandler> {
        self.topics
            .read()
            .get(topic)
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
            .unwrap_or_default()
    }

    /// Fire-and-forget publish: each handler runs on its own tokio task.
    ///
    /// Outside a tokio runtime the handlers run inline instead.
    pub fn dispatch(&self, event: Event) {
        let handlers = self.handlers_for(&event.name);
        if handlers.is_empty() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(event = %event.name, "No tokio runtime; dispatching inline");
            for handler in &handlers {
                handler(&event);
            }
            return;
        };

        let event = Arc::new(event);
        for handler in handlers {
            let event = Arc::clone(&event);
            runtime.spawn(async move { handler(&event) });
        }
    }

    /// Publish and wait: handlers run on the caller, in subscription order.
    pub fn dispatch_sync(&self, event: &Event) {
        for handler in self.handlers_for(&event.name) {
            handler(event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.read();
        let mut names: Vec<&String> = topics.keys().collect();
        names.sort();
        f.debug_struct("EventDispatcher")
            .field("topics", &names)
            .finish_non_exhaustive()
    }
}
