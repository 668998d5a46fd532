//! Startup orchestration.
//!
//! # Responsibilities
//! - Gate everything behind leadership
//! - Register kinds, then freeze the registry
//! - Start the watch cache and the telemetry endpoint
//! - Wait for the initial sync, then hand over to the runner
//! - Drain and release the lease on the way out
//!
//! # Startup Order
//! ```text
//! acquire leadership ──(cancelled)──→ Err, nothing else started
//!     │
//! register kinds → freeze → validate controllers
//!     │
//! start cache ─┬─ expose telemetry (failure only logged)
//!     │
//! wait for sync ──(shutdown / lease lost / timeout)──→ Err
//!     │
//! run controllers until shutdown or lease lost
//!     │
//! trigger shutdown → drain tasks (bounded) → release lease
//! ```
//!
//! # Design Decisions
//! - Fail fast: every startup error is fatal and returned to `main`
//! - Telemetry is best-effort and never blocks reconciliation
//! - The lease is released even on error so a standby takes over quickly

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{WatchCache, WatchSource};
use crate::config::{validate_config, ConfigError, ManagerConfig};
use crate::election::{LeaderElector, LeaderGuard, LeaseStore};
use crate::error::BootstrapError;
use crate::lifecycle::{LifecycleContext, Shutdown};
use crate::manager::{Controller, ControllerSet, RunOutcome, Runner};
use crate::observability::metrics;
use crate::observability::server::TelemetryState;
use crate::observability::TelemetryServer;
use crate::registry::groups::SchemeGroup;
use crate::registry::{KindSet, TypeRegistry};

/// Collects everything the bootstrap needs before it can run.
pub struct BootstrapBuilder {
    config: ManagerConfig,
    lease_store: Arc<dyn LeaseStore>,
    source: Arc<dyn WatchSource>,
    groups: Vec<SchemeGroup>,
    controllers: Vec<Arc<dyn Controller>>,
    shutdown: Option<Shutdown>,
    identity: Option<String>,
}

impl BootstrapBuilder {
    pub fn scheme_group(mut self, group: SchemeGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn scheme_groups(mut self, groups: impl IntoIterator<Item = SchemeGroup>) -> Self {
        self.groups.extend(groups);
        self
    }

    pub fn controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn controllers(mut self, controllers: impl IntoIterator<Item = Arc<dyn Controller>>) -> Self {
        self.controllers.extend(controllers);
        self
    }

    /// Use an existing shutdown handle, e.g. one wired to signals.
    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Override the identity resolved from config and environment.
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn build(self) -> Result<Bootstrap, BootstrapError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;

        let identity = self
            .identity
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.config.leader_election.resolve_identity());
        let elector = Arc::new(LeaderElector::new(
            self.lease_store,
            &self.config.leader_election.lock_name,
            &identity,
            self.config.leader_election.timing(),
        ));
        let shutdown = self.shutdown.unwrap_or_default();
        let context = LifecycleContext::new(shutdown.clone(), elector.watch());

        Ok(Bootstrap {
            config: self.config,
            elector,
            source: self.source,
            groups: self.groups,
            controllers: self.controllers,
            shutdown,
            context,
        })
    }
}

/// The operator's startup sequence.
pub struct Bootstrap {
    config: ManagerConfig,
    elector: Arc<LeaderElector>,
    source: Arc<dyn WatchSource>,
    groups: Vec<SchemeGroup>,
    controllers: Vec<Arc<dyn Controller>>,
    shutdown: Shutdown,
    context: LifecycleContext,
}

impl Bootstrap {
    pub fn builder(
        config: ManagerConfig,
        lease_store: Arc<dyn LeaseStore>,
        source: Arc<dyn WatchSource>,
    ) -> BootstrapBuilder {
        BootstrapBuilder {
            config,
            lease_store,
            source,
            groups: Vec::new(),
            controllers: Vec::new(),
            shutdown: None,
            identity: None,
        }
    }

    /// Shared view of leadership, registry and cache.
    pub fn context(&self) -> LifecycleContext {
        self.context.clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn identity(&self) -> &str {
        self.elector.identity()
    }

    /// Run until shutdown. Returns `Ok(())` only for a clean shutdown.
    pub async fn run(self) -> Result<(), BootstrapError> {
        let elector = Arc::clone(&self.elector);
        let mut guard = match elector.acquire(self.shutdown.subscribe()).await {
            Ok(guard) => guard,
            Err(e) => {
                error!(error = %e, "Leader election failed");
                return Err(e.into());
            }
        };

        let mut tasks = Vec::new();
        let result = self.lead(&mut guard, &mut tasks).await;

        self.shutdown.trigger();
        self.drain(tasks).await;
        if let Err(e) = guard.release().await {
            warn!(error = %e, "Failed to release lease");
        }

        match &result {
            Ok(()) => info!("Manager stopped"),
            Err(e) => error!(error = %e, "Manager stopped with error"),
        }
        result
    }

    /// Everything that happens while we hold the lease.
    async fn lead(
        &self,
        guard: &mut LeaderGuard,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<(), BootstrapError> {
        let kinds = self.register_kinds()?;
        self.context.set_registry(kinds.clone());

        let mut controllers = ControllerSet::new(&kinds);
        for controller in &self.controllers {
            controllers.add(Arc::clone(controller))?;
        }

        let (events_tx, events_rx) = mpsc::channel(self.config.cache.event_buffer);
        let cache = Arc::new(WatchCache::new(
            kinds,
            Arc::clone(&self.source),
            self.config.cache.namespace(),
            events_tx.clone(),
        ));
        self.context.set_cache(Arc::clone(&cache));
        tasks.extend(cache.start(&self.shutdown));

        if let Some(task) = self.expose_telemetry().await {
            tasks.push(task);
        }

        self.wait_for_sync(&cache, guard).await?;

        let runner = Runner::new(controllers, cache, self.context.clone(), events_rx, events_tx);
        match runner.run(self.shutdown.subscribe()).await {
            RunOutcome::Shutdown => Ok(()),
            RunOutcome::LeadershipLost => Err(BootstrapError::LeadershipLost),
        }
    }

    fn register_kinds(&self) -> Result<KindSet, BootstrapError> {
        let mut registry = TypeRegistry::new();
        for group in &self.groups {
            group.add_to(&mut registry)?;
            debug!(group = group.name, kinds = group.kinds.len(), "Registered scheme group");
        }
        let kinds = registry.freeze();
        info!(kinds = kinds.len(), "Registry frozen");
        Ok(kinds)
    }

    /// Start the telemetry endpoint. Failures are logged and ignored.
    async fn expose_telemetry(&self) -> Option<JoinHandle<()>> {
        if !self.config.metrics.enabled {
            debug!("Metrics endpoint disabled");
            return None;
        }
        let addr = match self.config.metrics.address() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(host = %self.config.metrics.host, error = %e, "Invalid metrics address");
                return None;
            }
        };
        let state = TelemetryState {
            metrics: metrics::recorder_handle(),
            context: self.context.clone(),
        };

        match TelemetryServer::expose(addr, state, self.shutdown.subscribe()).await {
            Ok(handle) => {
                self.context.set_telemetry_addr(handle.local_addr);
                Some(handle.task)
            }
            Err(e) => {
                warn!(error = %e, "Could not expose metrics, continuing without them");
                None
            }
        }
    }

    async fn wait_for_sync(
        &self,
        cache: &WatchCache,
        guard: &mut LeaderGuard,
    ) -> Result<(), BootstrapError> {
        let timeout = self.config.cache.sync_timeout();
        let deadline = async move {
            match timeout {
                Some(timeout) => {
                    tokio::time::sleep(timeout).await;
                    timeout
                }
                None => std::future::pending().await,
            }
        };

        info!(
            kinds = cache.kinds().len(),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Waiting for cache sync"
        );

        tokio::select! {
            synced = cache.wait_for_sync(self.shutdown.subscribe()) => {
                if synced {
                    info!("Cache synced");
                    Ok(())
                } else {
                    Err(BootstrapError::SyncCancelled)
                }
            }
            _ = guard.lost() => Err(BootstrapError::LeadershipLost),
            timeout = deadline => Err(BootstrapError::SyncTimeout {
                timeout,
                pending: cache.pending(),
            }),
        }
    }

    /// Wait for background tasks, aborting whatever outlives the deadline.
    async fn drain(&self, tasks: Vec<JoinHandle<()>>) {
        let deadline = self.config.shutdown.drain_timeout();
        let count = tasks.len();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();

        let joined = tokio::time::timeout(deadline, async move {
            for task in tasks {
                let _ = task.await;
            }
        })
        .await;

        match joined {
            Ok(()) => debug!(tasks = count, "Background tasks drained"),
            Err(_) => {
                warn!(
                    tasks = count,
                    timeout_ms = deadline.as_millis() as u64,
                    "Drain timeout exceeded, aborting remaining tasks"
                );
                for handle in aborts {
                    handle.abort();
                }
            }
        }
    }
}
