use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use super::order::start_order;
use super::{LifecycleError, UnitCtx, UnitKind, UnitState};
use crate::event::Event;

struct Entry<U: ?Sized> {
    unit: Arc<U>,
    deps: Vec<String>,
    state: UnitState,
}

struct Graph<U: ?Sized> {
    entries: HashMap<String, Entry<U>>,
    order: Vec<String>,
}

impl<U: ?Sized> Graph<U> {
    fn dependency_map(&self) -> BTreeMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|(name, e)| (name.clone(), e.deps.clone()))
            .collect()
    }
}

/// Dependency-ordered lifecycle engine for one unit family.
///
/// Sweeps (`start_all`, `stop_all`, `start_one`, `stop_one`) are serialized. The unit graph
/// and states sit behind a sync lock that is never held across a unit's `start`/`stop`.
pub struct Orchestrator<U: ?Sized + UnitKind> {
    ctx: UnitCtx,
    graph: RwLock<Graph<U>>,
    sweep: tokio::sync::Mutex<()>,
}

impl<U: ?Sized + UnitKind> Orchestrator<U> {
    #[must_use]
    pub fn new(ctx: UnitCtx) -> Self {
        Self {
            ctx,
            graph: RwLock::new(Graph {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
            sweep: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn ctx(&self) -> &UnitCtx {
        &self.ctx
    }

    /// Register one unit. Its dependencies must already be registered.
    ///
    /// # Errors
    /// Duplicate name, unknown dependency or a dependency cycle; nothing is added on error.
    pub fn register(&self, unit: Arc<U>) -> Result<(), LifecycleError> {
        self.register_all(vec![unit])
    }

    /// Register a batch atomically. Units in the batch may depend on each other.
    ///
    /// # Errors
    /// Duplicate name, unknown dependency or a dependency cycle; nothing is added on error.
    pub fn register_all(&self, units: Vec<Arc<U>>) -> Result<(), LifecycleError> {
        let mut graph = self.graph.write();

        let mut batch: Vec<(String, Vec<String>, Arc<U>)> = Vec::with_capacity(units.len());
        for unit in units {
            let name = unit.name().to_owned();
            if graph.entries.contains_key(&name) || batch.iter().any(|(n, _, _)| *n == name) {
                return Err(LifecycleError::AlreadyRegistered { kind: U::KIND, name });
            }
            let deps = unit.dependencies();
            batch.push((name, deps, unit));
        }

        for (name, deps, _) in &batch {
            for dep in deps {
                let known =
                    graph.entries.contains_key(dep) || batch.iter().any(|(n, _, _)| n == dep);
                if !known {
                    return Err(LifecycleError::UnknownDependency {
                        kind: U::KIND,
                        unit: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut candidate = graph.dependency_map();
        for (name, deps, _) in &batch {
            candidate.insert(name.clone(), deps.clone());
        }
        let order = start_order(&candidate)?;

        for (name, deps, unit) in batch {
            tracing::debug!(kind = U::KIND, unit = %name, deps = ?deps, "Registered unit");
            graph.entries.insert(
                name,
                Entry {
                    unit,
                    deps,
                    state: UnitState::Stopped,
                },
            );
        }
        graph.order = order;
        Ok(())
    }

    /// Start every unit in dependency order, skipping ones already running.
    ///
    /// # Errors
    /// Aborts on the first unit that fails to start; that unit is left `Failed`.
    pub async fn start_all(&self) -> Result<(), LifecycleError> {
        let _sweep = self.sweep.lock().await;
        let order = self.start_order();
        tracing::info!(kind = U::KIND, units = order.len(), "Starting all");
        for name in &order {
            self.start_unit(name).await?;
        }
        Ok(())
    }

    /// Stop every running unit in reverse start order.
    ///
    /// # Errors
    /// Returns the last stop failure. Every running unit is attempted.
    pub async fn stop_all(&self) -> Result<(), LifecycleError> {
        let _sweep = self.sweep.lock().await;
        let order = self.stop_order();
        tracing::info!(kind = U::KIND, units = order.len(), "Stopping all");
        self.stop_units(&order).await
    }

    /// Start `name` and, first, everything it transitively depends on.
    ///
    /// # Errors
    /// Unknown name, or the first start failure.
    pub async fn start_one(&self, name: &str) -> Result<(), LifecycleError> {
        let _sweep = self.sweep.lock().await;
        let closure = {
            let graph = self.graph.read();
            if !graph.entries.contains_key(name) {
                return Err(Self::not_found(name));
            }
            closure_of(name, |n| {
                graph
                    .entries
                    .get(n)
                    .map(|e| e.deps.clone())
                    .unwrap_or_default()
            })
        };
        for unit in self.start_order().iter().filter(|u| closure.contains(*u)) {
            self.start_unit(unit).await?;
        }
        Ok(())
    }

    /// Stop everything that transitively depends on `name`, then `name` itself.
    ///
    /// # Errors
    /// Unknown name, or the last stop failure.
    pub async fn stop_one(&self, name: &str) -> Result<(), LifecycleError> {
        let _sweep = self.sweep.lock().await;
        let closure = {
            let graph = self.graph.read();
            if !graph.entries.contains_key(name) {
                return Err(Self::not_found(name));
            }
            let mut dependents: HashMap<&str, Vec<String>> = HashMap::new();
            for (unit, entry) in &graph.entries {
                for dep in &entry.deps {
                    dependents.entry(dep.as_str()).or_default().push(unit.clone());
                }
            }
            closure_of(name, |n| dependents.get(n).cloned().unwrap_or_default())
        };
        let order: Vec<String> = self
            .stop_order()
            .into_iter()
            .filter(|u| closure.contains(u))
            .collect();
        self.stop_units(&order).await
    }

    /// Current start order (dependencies first).
    #[must_use]
    pub fn start_order(&self) -> Vec<String> {
        self.graph.read().order.clone()
    }

    /// Current stop order: the exact reverse of [`Self::start_order`].
    #[must_use]
    pub fn stop_order(&self) -> Vec<String> {
        self.graph.read().order.iter().rev().cloned().collect()
    }

    #[must_use]
    pub fn state(&self, name: &str) -> Option<UnitState> {
        self.graph.read().entries.get(name).map(|e| e.state)
    }

    /// States of all units, in start order.
    #[must_use]
    pub fn states(&self) -> Vec<(String, UnitState)> {
        let graph = self.graph.read();
        graph
            .order
            .iter()
            .filter_map(|n| graph.entries.get(n).map(|e| (n.clone(), e.state)))
            .collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<U>> {
        self.graph.read().entries.get(name).map(|e| Arc::clone(&e.unit))
    }

    /// Registered names in start order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.start_order()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.read().entries.is_empty()
    }

    fn not_found(name: &str) -> LifecycleError {
        LifecycleError::NotFound {
            kind: U::KIND,
            name: name.to_owned(),
        }
    }

    fn set_state(&self, name: &str, state: UnitState) {
        if let Some(entry) = self.graph.write().entries.get_mut(name) {
            entry.state = state;
        }
    }

    fn publish(&self, name: &str, phase: &str, error: Option<&str>) {
        let mut event = Event::new(format!("{}.{phase}", U::KIND)).with(U::KIND, name);
        if let Some(error) = error {
            event = event.with("error", error);
        }
        self.ctx.dispatcher().dispatch(event);
    }

    async fn start_unit(&self, name: &str) -> Result<(), LifecycleError> {
        let unit = {
            let mut graph = self.graph.write();
            let Some(entry) = graph.entries.get_mut(name) else {
                return Err(Self::not_found(name));
            };
            match entry.state {
                UnitState::Running | UnitState::Starting | UnitState::Stopping => return Ok(()),
                UnitState::Stopped | UnitState::Failed => {}
            }
            entry.state = UnitState::Starting;
            Arc::clone(&entry.unit)
        };

        self.publish(name, "starting", None);
        match unit.start(&self.ctx).await {
            Ok(()) => {
                self.set_state(name, UnitState::Running);
                self.publish(name, "started", None);
                tracing::info!(kind = U::KIND, unit = %name, "Started");
                Ok(())
            }
            Err(source) => {
                self.set_state(name, UnitState::Failed);
                let message = format!("{source:#}");
                self.publish(name, "failed", Some(&message));
                tracing::error!(kind = U::KIND, unit = %name, error = %message, "Failed to start");
                Err(LifecycleError::Start {
                    kind: U::KIND,
                    name: name.to_owned(),
                    source,
                })
            }
        }
    }

    async fn stop_units(&self, order: &[String]) -> Result<(), LifecycleError> {
        let mut last_err = None;
        for name in order {
            if let Err(e) = self.stop_unit(name).await {
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    async fn stop_unit(&self, name: &str) -> Result<(), LifecycleError> {
        let unit = {
            let mut graph = self.graph.write();
            let Some(entry) = graph.entries.get_mut(name) else {
                return Err(Self::not_found(name));
            };
            if entry.state != UnitState::Running {
                return Ok(());
            }
            entry.state = UnitState::Stopping;
            Arc::clone(&entry.unit)
        };

        self.publish(name, "stopping", None);
        match unit.stop(&self.ctx).await {
            Ok(()) => {
                self.set_state(name, UnitState::Stopped);
                self.publish(name, "stopped", None);
                tracing::info!(kind = U::KIND, unit = %name, "Stopped");
                Ok(())
            }
            Err(source) => {
                self.set_state(name, UnitState::Failed);
                let message = format!("{source:#}");
                self.publish(name, "failed", Some(&message));
                tracing::warn!(kind = U::KIND, unit = %name, error = %message, "Failed to stop");
                Err(LifecycleError::Stop {
                    kind: U::KIND,
                    name: name.to_owned(),
                    source,
                })
            }
        }
    }
}

/// `root` plus everything reachable through `next`.
fn closure_of<F>(root: &str, next: F) -> BTreeSet<String>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut seen = BTreeSet::from([root.to_owned()]);
    let mut queue = VecDeque::from([root.to_owned()]);
    while let Some(current) = queue.pop_front() {
        for n in next(&current) {
            if seen.insert(n.clone()) {
                queue.push_back(n);
            }
        }
    }
    seen
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::lifecycle::{Module, Service, Unit};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        deps: &'static [&'static str],
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    impl Recorder {
        fn new(
            name: &'static str,
            deps: &'static [&'static str],
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                deps,
                log: log.clone(),
                fail_start: false,
            })
        }
    }

    #[async_trait]
    impl Unit for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.iter().map(|d| (*d).to_owned()).collect()
        }

        async fn start(&self, _ctx: &UnitCtx) -> anyhow::Result<()> {
            self.log.lock().push(format!("start:{}", self.name));
            if self.fail_start {
                anyhow::bail!("{} refused to start", self.name);
            }
            Ok(())
        }

        async fn stop(&self, _ctx: &UnitCtx) -> anyhow::Result<()> {
            self.log.lock().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    impl Service for Recorder {}
    impl Module for Recorder {}

    #[tokio::test]
    async fn start_one_pulls_in_dependencies_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr: Orchestrator<dyn Service> = Orchestrator::new(UnitCtx::default());
        mgr.register(Recorder::new("db", &[], &log)).unwrap();
        mgr.register(Recorder::new("cache", &["db"], &log)).unwrap();
        mgr.register(Recorder::new("api", &["cache"], &log)).unwrap();
        mgr.register(Recorder::new("metrics", &[], &log)).unwrap();

        mgr.start_one("cache").await.unwrap();

        assert_eq!(*log.lock(), vec!["start:db", "start:cache"]);
        assert_eq!(mgr.state("api"), Some(UnitState::Stopped));
        assert_eq!(mgr.state("metrics"), Some(UnitState::Stopped));
    }

    #[tokio::test]
    async fn stop_one_takes_dependents_down_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr: Orchestrator<dyn Module> = Orchestrator::new(UnitCtx::default());
        mgr.register(Recorder::new("db", &[], &log)).unwrap();
        mgr.register(Recorder::new("cache", &["db"], &log)).unwrap();
        mgr.register(Recorder::new("api", &["cache"], &log)).unwrap();
        mgr.register(Recorder::new("metrics", &[], &log)).unwrap();
        mgr.start_all().await.unwrap();
        log.lock().clear();

        mgr.stop_one("cache").await.unwrap();

        assert_eq!(*log.lock(), vec!["stop:api", "stop:cache"]);
        assert_eq!(mgr.state("db"), Some(UnitState::Running));
        assert_eq!(mgr.state("metrics"), Some(UnitState::Running));
    }

    #[tokio::test]
    async fn unknown_unit_is_not_found() {
        let mgr: Orchestrator<dyn Service> = Orchestrator::new(UnitCtx::default());
        assert!(matches!(
            mgr.start_one("ghost").await,
            Err(LifecycleError::NotFound { kind: "service", .. })
        ));
        assert!(matches!(
            mgr.stop_one("ghost").await,
            Err(LifecycleError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_unit_is_left_failed_until_started_explicitly() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr: Orchestrator<dyn Service> = Orchestrator::new(UnitCtx::default());
        mgr.register(Arc::new(Recorder {
            name: "flaky",
            deps: &[],
            log: log.clone(),
            fail_start: true,
        }))
        .unwrap();

        assert!(mgr.start_all().await.is_err());
        assert_eq!(mgr.state("flaky"), Some(UnitState::Failed));

        // stop sweep leaves non-running units alone
        mgr.stop_all().await.unwrap();
        assert_eq!(mgr.state("flaky"), Some(UnitState::Failed));

        // explicit start retries it
        assert!(mgr.start_one("flaky").await.is_err());
        assert_eq!(*log.lock(), vec!["start:flaky", "start:flaky"]);
    }
}
