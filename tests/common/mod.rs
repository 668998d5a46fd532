//! Shared fixtures for the bootstrap integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use project_operator::cache::{MemorySource, ObjectRef, Resource, WatchCache};
use project_operator::election::{ElectionTiming, LeaderElector, LeaderGuard, LeaseStore, MemoryLeaseStore};
use project_operator::manager::{Action, Controller, ReconcileError};
use project_operator::registry::groups::{operator_group, OPERATOR_GROUP, OPERATOR_VERSION};
use project_operator::registry::Kind;
use project_operator::{Bootstrap, LifecycleContext, ManagerConfig, Shutdown};

/// Short election timings and an ephemeral metrics port.
pub fn fast_config() -> ManagerConfig {
    let mut config = ManagerConfig::default();
    config.leader_election.lease_duration_ms = 300;
    config.leader_election.renew_deadline_ms = 200;
    config.leader_election.retry_period_ms = 20;
    config.metrics.host = "127.0.0.1".to_string();
    config.metrics.port = 0;
    config.cache.sync_timeout_ms = 0;
    config.shutdown.drain_timeout_ms = 1_000;
    config
}

pub fn claim_kind() -> Kind {
    Kind::new(OPERATOR_GROUP, OPERATOR_VERSION, "ProjectClaim")
}

pub fn reference_kind() -> Kind {
    Kind::new(OPERATOR_GROUP, OPERATOR_VERSION, "ProjectReference")
}

pub fn claim(namespace: &str, name: &str) -> Resource {
    Resource::new(
        claim_kind(),
        Some(namespace),
        name,
        serde_json::json!({ "gcpProjectID": name }),
    )
}

/// One dispatch as seen by a controller.
#[derive(Debug, Clone)]
pub struct Observed {
    pub object: ObjectRef,
    /// Leader and AllSynced both held when the controller ran.
    pub ready: bool,
}

/// Controller that records every dispatch together with the gate state.
pub struct RecordingController {
    name: String,
    kinds: Vec<Kind>,
    context: Arc<OnceLock<LifecycleContext>>,
    seen: Arc<Mutex<Vec<Observed>>>,
}

impl RecordingController {
    pub fn new(name: &str, kinds: Vec<Kind>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            kinds,
            context: Arc::new(OnceLock::new()),
            seen: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Attach the context the gate state is read from.
    pub fn attach(&self, context: LifecycleContext) {
        let _ = self.context.set(context);
    }

    pub fn seen(&self) -> Vec<Observed> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Controller for RecordingController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> Vec<Kind> {
        self.kinds.clone()
    }

    async fn reconcile(&self, object: &ObjectRef, _cache: &WatchCache) -> Result<Action, ReconcileError> {
        let ready = self.context.get().is_some_and(|ctx| ctx.is_ready());
        self.seen.lock().unwrap().push(Observed {
            object: object.clone(),
            ready,
        });
        Ok(Action::Done)
    }
}

/// A bootstrap over the operator group with one recording controller.
pub fn bootstrap(
    config: ManagerConfig,
    store: &MemoryLeaseStore,
    source: &MemorySource,
    identity: &str,
) -> (Bootstrap, Arc<RecordingController>) {
    let recorder = RecordingController::new("recorder", vec![claim_kind()]);
    let bootstrap = Bootstrap::builder(config, Arc::new(store.clone()), Arc::new(source.clone()))
        .scheme_group(operator_group())
        .controller(recorder.clone())
        .identity(identity)
        .build()
        .unwrap();
    recorder.attach(bootstrap.context());
    (bootstrap, recorder)
}

/// Another replica contending for the same lock.
pub async fn hold_lease(store: &MemoryLeaseStore, identity: &str) -> LeaderGuard {
    let config = fast_config();
    let timing: ElectionTiming = config.leader_election.timing();
    let store: Arc<dyn LeaseStore> = Arc::new(store.clone());
    let elector = Arc::new(LeaderElector::new(
        store,
        &config.leader_election.lock_name,
        identity,
        timing,
    ));
    let shutdown = Shutdown::new();
    elector.acquire(shutdown.subscribe()).await.unwrap()
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Await `future` or fail the test after `timeout`.
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future)
        .await
        .expect("timed out")
}
