//! Reconcile runner.
//!
//! Pulls object references off the queue and hands them to controllers.
//! Runs only after both gates passed and re-checks them on every dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::cache::{ObjectRef, WatchCache};
use crate::lifecycle::{LifecycleContext, ShutdownListener};
use crate::manager::{Action, ControllerSet};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

const ERROR_BASE_DELAY: Duration = Duration::from_millis(50);
const ERROR_MAX_DELAY: Duration = Duration::from_secs(5);

/// Why the runner stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Shutdown,
    LeadershipLost,
}

pub struct Runner {
    controllers: ControllerSet,
    cache: Arc<WatchCache>,
    context: LifecycleContext,
    queue: mpsc::Receiver<ObjectRef>,
    requeue: mpsc::Sender<ObjectRef>,
    /// Consecutive failures per (controller, object).
    failures: HashMap<(String, ObjectRef), u32>,
}

impl Runner {
    pub fn new(
        controllers: ControllerSet,
        cache: Arc<WatchCache>,
        context: LifecycleContext,
        queue: mpsc::Receiver<ObjectRef>,
        requeue: mpsc::Sender<ObjectRef>,
    ) -> Self {
        Self {
            controllers,
            cache,
            context,
            queue,
            requeue,
            failures: HashMap::new(),
        }
    }

    /// Dispatch until shutdown or leadership loss.
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> RunOutcome {
        let mut leadership = self.context.leadership_watch();
        tracing::info!(controllers = self.controllers.len(), "Reconciliation started");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => return RunOutcome::Shutdown,
                _ = leadership.wait_for_lost() => return RunOutcome::LeadershipLost,
                next = self.queue.recv() => next,
            };
            let Some(object) = next else {
                shutdown.recv().await;
                return RunOutcome::Shutdown;
            };

            if !self.context.is_ready() {
                if !leadership.is_leader() {
                    return RunOutcome::LeadershipLost;
                }
                tracing::warn!(object = %object, "Cache not synced, skipping dispatch");
                continue;
            }

            // An in-flight reconcile is dropped as soon as the lease is lost.
            let requeue_shutdown = shutdown.clone();
            let completed = tokio::select! {
                biased;
                _ = shutdown.recv() => return RunOutcome::Shutdown,
                _ = leadership.wait_for_lost() => return RunOutcome::LeadershipLost,
                completed = self.dispatch(object, &requeue_shutdown) => completed,
            };
            if !completed && !leadership.is_leader() {
                return RunOutcome::LeadershipLost;
            }
        }
    }

    /// Run every controller watching the object's kind. Returns `false` if
    /// the gates closed before all of them ran.
    async fn dispatch(&mut self, object: ObjectRef, shutdown: &ShutdownListener) -> bool {
        let controllers: Vec<_> = self.controllers.for_kind(&object.kind).cloned().collect();
        for controller in controllers {
            if !self.context.is_ready() {
                tracing::warn!(object = %object, "Gates closed, stopping dispatch");
                return false;
            }
            let name = controller.name().to_string();
            let key = (name.clone(), object.clone());
            let start = Instant::now();

            match controller.reconcile(&object, &self.cache).await {
                Ok(Action::Done) => {
                    self.failures.remove(&key);
                    metrics::record_reconcile(&name, "success", start);
                }
                Ok(Action::RequeueAfter(delay)) => {
                    self.failures.remove(&key);
                    metrics::record_reconcile(&name, "requeue", start);
                    self.schedule(object.clone(), delay, shutdown);
                }
                Err(e) => {
                    let attempt = self.failures.entry(key).or_insert(0);
                    *attempt = attempt.saturating_add(1);
                    let delay = calculate_backoff(*attempt, ERROR_BASE_DELAY, ERROR_MAX_DELAY);
                    tracing::warn!(
                        controller = %name,
                        object = %object,
                        error = %e,
                        attempt = *attempt,
                        retry_ms = delay.as_millis() as u64,
                        "Reconcile failed"
                    );
                    metrics::record_reconcile(&name, "error", start);
                    self.schedule(object.clone(), delay, shutdown);
                }
            }
        }
        true
    }

    fn schedule(&self, object: ObjectRef, delay: Duration, shutdown: &ShutdownListener) {
        let requeue = self.requeue.clone();
        let mut shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = requeue.send(object).await;
                }
            }
        });
    }
}
