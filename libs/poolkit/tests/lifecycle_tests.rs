#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Lifecycle orchestration: ordering, cycle rejection, failure handling and events.

use async_trait::async_trait;
use parking_lot::Mutex;
use poolkit::{
    Event, LifecycleError, Module, ModuleManager, Service, ServiceManager, Unit, UnitCtx,
    UnitState,
};
use std::sync::Arc;
use std::time::Duration;

type CallLog = Arc<Mutex<Vec<String>>>;

struct TestUnit {
    name: String,
    deps: Vec<String>,
    log: CallLog,
    fail_start: bool,
    fail_stop: bool,
}

impl TestUnit {
    fn new(name: &str, deps: &[&str], log: &CallLog) -> Self {
        Self {
            name: name.to_owned(),
            deps: deps.iter().map(|d| (*d).to_owned()).collect(),
            log: log.clone(),
            fail_start: false,
            fail_stop: false,
        }
    }

    fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

#[async_trait]
impl Unit for TestUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.deps.clone()
    }

    async fn start(&self, _ctx: &UnitCtx) -> anyhow::Result<()> {
        self.log.lock().push(format!("start:{}", self.name));
        if self.fail_start {
            anyhow::bail!("start of {} failed", self.name);
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &UnitCtx) -> anyhow::Result<()> {
        self.log.lock().push(format!("stop:{}", self.name));
        if self.fail_stop {
            anyhow::bail!("stop of {} failed", self.name);
        }
        Ok(())
    }
}

impl Service for TestUnit {}

impl Module for TestUnit {
    fn description(&self) -> &str {
        "test module"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }
}

fn calls(log: &CallLog, prefix: &str) -> Vec<String> {
    log.lock()
        .iter()
        .filter_map(|c| c.strip_prefix(prefix).map(str::to_owned))
        .collect()
}

/// Diamond: `api` -> (`registry`, `events`), `registry` -> `events`, `events` -> `store`.
fn diamond(log: &CallLog) -> Vec<Arc<TestUnit>> {
    [
        ("store", &[][..]),
        ("events", &["store"][..]),
        ("registry", &["events"][..]),
        ("api", &["registry", "events"][..]),
    ]
    .into_iter()
    .map(|(name, deps)| Arc::new(TestUnit::new(name, deps, log)))
    .collect()
}

#[tokio::test]
async fn start_and_stop_visit_each_service_once_in_mirrored_order() {
    let log = CallLog::default();
    let mgr = ServiceManager::new(UnitCtx::default());
    // batch registration does not care about the order inside the batch
    mgr.register_all(
        diamond(&log)
            .into_iter()
            .rev()
            .map(|u| u as Arc<dyn Service>)
            .collect(),
    )
    .unwrap();

    mgr.start_all().await.unwrap();
    mgr.stop_all().await.unwrap();

    let started = calls(&log, "start:");
    let stopped = calls(&log, "stop:");
    assert_eq!(started, vec!["store", "events", "registry", "api"]);
    let mut reversed = started.clone();
    reversed.reverse();
    assert_eq!(stopped, reversed, "Stop order must mirror start order");
    assert_eq!(mgr.stop_order(), reversed);
}

#[tokio::test]
async fn second_start_all_skips_running_units() {
    let log = CallLog::default();
    let mgr = ModuleManager::new(UnitCtx::default());
    mgr.register(Arc::new(TestUnit::new("registry", &[], &log)))
        .unwrap();

    mgr.start_all().await.unwrap();
    mgr.start_all().await.unwrap();

    assert_eq!(calls(&log, "start:"), vec!["registry"]);
    assert_eq!(mgr.state("registry"), Some(UnitState::Running));
}

#[tokio::test]
async fn stop_all_only_stops_running_units() {
    let log = CallLog::default();
    let mgr = ServiceManager::new(UnitCtx::default());
    mgr.register(Arc::new(TestUnit::new("a", &[], &log))).unwrap();

    mgr.stop_all().await.unwrap();
    assert!(log.lock().is_empty(), "Never-started unit must not be stopped");
}

#[test]
fn cycle_within_batch_is_rejected_and_nothing_is_added() {
    let log = CallLog::default();
    let mgr = ServiceManager::new(UnitCtx::default());
    mgr.register(Arc::new(TestUnit::new("base", &[], &log)))
        .unwrap();

    let err = mgr
        .register_all(vec![
            Arc::new(TestUnit::new("a", &["b"], &log)),
            Arc::new(TestUnit::new("b", &["a", "base"], &log)),
        ])
        .unwrap_err();

    match err {
        LifecycleError::CircularDependency { units } => assert_eq!(units, vec!["a", "b"]),
        other => panic!("Expected CircularDependency, got {other:?}"),
    }
    assert_eq!(mgr.names(), vec!["base"], "Failed batch must leave no trace");
}

#[test]
fn self_dependency_is_rejected() {
    let log = CallLog::default();
    let mgr = ModuleManager::new(UnitCtx::default());
    let err = mgr
        .register(Arc::new(TestUnit::new("loop", &["loop"], &log)))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CircularDependency { .. }));
    assert!(mgr.is_empty());
}

#[test]
fn unknown_dependency_and_duplicates_are_rejected() {
    let log = CallLog::default();
    let mgr = ServiceManager::new(UnitCtx::default());

    let err = mgr
        .register(Arc::new(TestUnit::new("api", &["registry"], &log)))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "service api depends on unknown service registry"
    );

    mgr.register(Arc::new(TestUnit::new("registry", &[], &log)))
        .unwrap();
    let err = mgr
        .register(Arc::new(TestUnit::new("registry", &[], &log)))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyRegistered { kind: "service", .. }));
    assert_eq!(mgr.len(), 1);
}

#[tokio::test]
async fn start_failure_aborts_sweep_and_marks_unit_failed() {
    let log = CallLog::default();
    let mgr = ServiceManager::new(UnitCtx::default());
    mgr.register(Arc::new(TestUnit::new("store", &[], &log)))
        .unwrap();
    mgr.register(Arc::new(
        TestUnit::new("events", &["store"], &log).failing_start(),
    ))
    .unwrap();
    mgr.register(Arc::new(TestUnit::new("api", &["events"], &log)))
        .unwrap();

    let err = mgr.start_all().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Start { ref name, .. } if name == "events"));
    assert!(err.to_string().contains("start of events failed"));

    assert_eq!(calls(&log, "start:"), vec!["store", "events"]);
    assert_eq!(mgr.state("store"), Some(UnitState::Running));
    assert_eq!(mgr.state("events"), Some(UnitState::Failed));
    assert_eq!(mgr.state("api"), Some(UnitState::Stopped));
}

#[tokio::test]
async fn stop_failure_is_reported_but_sweep_continues() {
    let log = CallLog::default();
    let mgr = ModuleManager::new(UnitCtx::default());
    mgr.register(Arc::new(TestUnit::new("a", &[], &log))).unwrap();
    mgr.register(Arc::new(TestUnit::new("b", &["a"], &log).failing_stop()))
        .unwrap();
    mgr.register(Arc::new(TestUnit::new("c", &["b"], &log))).unwrap();
    mgr.start_all().await.unwrap();

    let err = mgr.stop_all().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Stop { ref name, .. } if name == "b"));
    assert_eq!(calls(&log, "stop:"), vec!["c", "b", "a"]);
    assert_eq!(mgr.state("a"), Some(UnitState::Stopped));
    assert_eq!(mgr.state("b"), Some(UnitState::Failed));
    assert_eq!(mgr.state("c"), Some(UnitState::Stopped));
}

#[tokio::test]
async fn lifecycle_events_use_family_prefix() {
    let log = CallLog::default();
    let ctx = UnitCtx::default();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    for topic in ["module.starting", "module.started", "module.failed"] {
        let tx = tx.clone();
        ctx.dispatcher().subscribe(topic, move |e: &Event| {
            _ = tx.send(e.clone());
        });
    }

    let mgr = ModuleManager::new(ctx);
    mgr.register(Arc::new(TestUnit::new("registry", &[], &log)))
        .unwrap();
    mgr.register(Arc::new(
        TestUnit::new("federation", &["registry"], &log).failing_start(),
    ))
    .unwrap();
    assert!(mgr.start_all().await.is_err());

    let mut seen = Vec::new();
    for _ in 0..4 {
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event should arrive")
            .expect("channel open");
        seen.push(format!(
            "{}:{}",
            event.name,
            event.str_field("module").unwrap_or_default()
        ));
        if event.name == "module.failed" {
            assert!(
                event
                    .str_field("error")
                    .is_some_and(|e| e.contains("start of federation failed")),
                "Failure event should carry the error"
            );
        }
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![
            "module.failed:federation",
            "module.started:registry",
            "module.starting:federation",
            "module.starting:registry",
        ]
    );
}

#[tokio::test]
async fn orchestrator_works_generically_over_families() {
    let log = CallLog::default();
    let services = ServiceManager::new(UnitCtx::default());
    let modules = ModuleManager::new(UnitCtx::default());
    services
        .register_all(diamond(&log).into_iter().map(|u| u as Arc<dyn Service>).collect())
        .unwrap();
    modules
        .register_all(diamond(&log).into_iter().map(|u| u as Arc<dyn Module>).collect())
        .unwrap();

    assert_eq!(services.start_order(), modules.start_order());
    let module = modules.get("api").unwrap();
    assert_eq!(module.version(), "1.0.0");
    assert_eq!(module.description(), "test module");
}
