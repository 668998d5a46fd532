//! Lease-based leader elector.
//!
//! Only one replica holds the lease at a time. The holder renews it
//! periodically; a replica that cannot renew within the renew deadline gives
//! up leadership before the lease can expire and be taken over, so two
//! replicas never act as leader concurrently.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::election::lease::{LeaseError, LeaseRecord, LeaseStore};
use crate::election::state::{LeadershipState, LeadershipWatch};
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;
use crate::resilience::backoff::jittered;

/// Leader election errors
#[derive(Debug, Error)]
pub enum LeaderElectionError {
    #[error("lease store error: {0}")]
    Lease(#[from] LeaseError),

    #[error("acquisition of lock {lock} cancelled by shutdown")]
    Cancelled { lock: String },

    #[error("elector for lock {lock} was already used (state: {state})")]
    AlreadyStarted { lock: String, state: LeadershipState },
}

/// Lease timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionTiming {
    /// How long a lease stays valid without renewal.
    pub lease_duration: Duration,
    /// How long the holder keeps trying to renew before giving up.
    pub renew_deadline: Duration,
    /// Interval between acquisition attempts and between renewals.
    pub retry_period: Duration,
}

impl Default for ElectionTiming {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(15),
            renew_deadline: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
        }
    }
}

/// Leader elector for one lock.
///
/// Single use: once acquisition was attempted the elector cannot start
/// again, and Lost is final.
pub struct LeaderElector {
    store: Arc<dyn LeaseStore>,
    lock_name: String,
    identity: String,
    timing: ElectionTiming,
    state: watch::Sender<LeadershipState>,
}

impl LeaderElector {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        lock_name: &str,
        identity: &str,
        timing: ElectionTiming,
    ) -> Self {
        let (state, _) = watch::channel(LeadershipState::Unknown);
        Self {
            store,
            lock_name: lock_name.to_string(),
            identity: identity.to_string(),
            timing,
            state,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    pub fn state(&self) -> LeadershipState {
        *self.state.borrow()
    }

    /// Read-only view of the state for other components.
    pub fn watch(&self) -> LeadershipWatch {
        LeadershipWatch::new(self.state.subscribe())
    }

    /// Block until leadership is acquired or `shutdown` fires.
    ///
    /// On success the returned guard keeps renewing the lease in the
    /// background. On cancellation the state is left at Acquiring and a
    /// lease won by an attempt that was in flight is released again.
    pub async fn acquire(
        self: Arc<Self>,
        mut shutdown: ShutdownListener,
    ) -> Result<LeaderGuard, LeaderElectionError> {
        if !self.transition(LeadershipState::Acquiring) {
            return Err(LeaderElectionError::AlreadyStarted {
                lock: self.lock_name.clone(),
                state: self.state(),
            });
        }

        info!(
            identity = %self.identity,
            lock = %self.lock_name,
            "Waiting for leadership..."
        );

        loop {
            if shutdown.is_triggered() {
                return Err(self.cancel().await);
            }

            let attempt = self.try_acquire_or_renew();
            tokio::pin!(attempt);
            let attempt = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    // A write already sent may still land; let it settle so
                    // the release below sees it.
                    let settle = tokio::time::timeout(self.timing.renew_deadline, &mut attempt);
                    if settle.await.is_err() {
                        warn!(identity = %self.identity, "Lease write still pending at cancellation");
                    }
                    return Err(self.cancel().await);
                }
                result = &mut attempt => result,
            };

            match attempt {
                Ok(true) => {
                    self.transition(LeadershipState::Leader);
                    info!(identity = %self.identity, lock = %self.lock_name, "Leadership acquired");
                    return Ok(self.create_guard());
                }
                Ok(false) => {
                    debug!(
                        identity = %self.identity,
                        retry_ms = self.timing.retry_period.as_millis() as u64,
                        "Lease held by another, waiting..."
                    );
                }
                Err(e) => {
                    // Transient store errors shouldn't stop us
                    warn!(
                        identity = %self.identity,
                        error = %e,
                        "Failed to acquire lease, retrying..."
                    );
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => return Err(self.cancel().await),
                _ = tokio::time::sleep(jittered(self.timing.retry_period)) => {}
            }
        }
    }

    /// Abandon acquisition, handing back a lease an in-flight attempt won.
    async fn cancel(&self) -> LeaderElectionError {
        warn!(identity = %self.identity, lock = %self.lock_name, "Leadership acquisition cancelled");
        match tokio::time::timeout(self.timing.renew_deadline, self.release_lease()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(identity = %self.identity, error = %e, "Failed to release lease after cancellation");
            }
            Err(_) => {
                warn!(identity = %self.identity, "Timed out releasing lease after cancellation");
            }
        }
        LeaderElectionError::Cancelled {
            lock: self.lock_name.clone(),
        }
    }

    /// Apply a state transition. Illegal transitions are ignored.
    fn transition(&self, next: LeadershipState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            metrics::record_leadership(next);
        }
        changed
    }

    fn create_guard(self: &Arc<Self>) -> LeaderGuard {
        let elector = Arc::clone(self);
        let renewal_task = tokio::spawn(async move {
            elector.renewal_loop().await;
        });

        LeaderGuard {
            elector: Arc::clone(self),
            renewal_task,
            watch: self.watch(),
        }
    }

    /// One step of the lease protocol.
    ///
    /// `Ok(true)` means we hold the lease after this call. Conflicts are not
    /// errors: they mean someone else wrote first.
    async fn try_acquire_or_renew(&self) -> Result<bool, LeaseError> {
        let now = Instant::now();
        match self.store.get(&self.lock_name).await? {
            None => self.create_lease(now).await,
            Some(lease) if lease.is_held_by(&self.identity) => self.renew_lease(lease, now).await,
            Some(lease) if lease.is_expired(now) => self.take_over_lease(lease, now).await,
            Some(_) => Ok(false),
        }
    }

    async fn create_lease(&self, now: Instant) -> Result<bool, LeaseError> {
        let record = LeaseRecord {
            holder: Some(self.identity.clone()),
            lease_duration: self.timing.lease_duration,
            acquire_time: now,
            renew_time: now,
            transitions: 0,
            version: 0,
        };
        match self.store.create(&self.lock_name, record).await {
            Ok(_) => {
                info!(identity = %self.identity, "Created new lease");
                Ok(true)
            }
            Err(LeaseError::Conflict(_)) => {
                debug!(identity = %self.identity, "Lease creation conflict, will retry");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn renew_lease(&self, mut lease: LeaseRecord, now: Instant) -> Result<bool, LeaseError> {
        lease.renew_time = now;
        lease.lease_duration = self.timing.lease_duration;
        match self.store.replace(&self.lock_name, lease).await {
            Ok(_) => {
                debug!(identity = %self.identity, "Lease renewed");
                Ok(true)
            }
            Err(LeaseError::Conflict(_)) | Err(LeaseError::NotFound(_)) => {
                warn!(identity = %self.identity, "Lease renewal conflict");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn take_over_lease(&self, lease: LeaseRecord, now: Instant) -> Result<bool, LeaseError> {
        let transitions = lease.transitions + 1;
        let record = LeaseRecord {
            holder: Some(self.identity.clone()),
            lease_duration: self.timing.lease_duration,
            acquire_time: now,
            renew_time: now,
            transitions,
            version: lease.version,
        };
        match self.store.replace(&self.lock_name, record).await {
            Ok(_) => {
                info!(identity = %self.identity, transitions, "Took over expired lease");
                Ok(true)
            }
            Err(LeaseError::Conflict(_)) | Err(LeaseError::NotFound(_)) => {
                debug!(identity = %self.identity, "Lease takeover conflict, will retry");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Renew a lease we believe we hold. Never takes the lease over.
    async fn renew_held(&self) -> Result<bool, LeaseError> {
        let now = Instant::now();
        match self.store.get(&self.lock_name).await? {
            Some(lease) if lease.is_held_by(&self.identity) => self.renew_lease(lease, now).await,
            _ => Ok(false),
        }
    }

    /// Renewal loop that runs while we hold leadership
    async fn renewal_loop(&self) {
        let mut last_renew = Instant::now();
        loop {
            tokio::time::sleep(self.timing.retry_period).await;

            let remaining = self
                .timing
                .renew_deadline
                .saturating_sub(last_renew.elapsed());
            let attempt = tokio::time::timeout(remaining, self.renew_held()).await;

            match attempt {
                Ok(Ok(true)) => last_renew = Instant::now(),
                Ok(Ok(false)) => {
                    warn!(identity = %self.identity, "Lease is held by another replica");
                    break;
                }
                Ok(Err(e)) if last_renew.elapsed() < self.timing.renew_deadline => {
                    warn!(identity = %self.identity, error = %e, "Failed to renew lease, retrying");
                }
                Ok(Err(e)) => {
                    warn!(identity = %self.identity, error = %e, "Renew deadline exceeded");
                    break;
                }
                Err(_) => {
                    warn!(identity = %self.identity, "Renew deadline exceeded");
                    break;
                }
            }
        }

        if self.transition(LeadershipState::Lost) {
            error!(identity = %self.identity, lock = %self.lock_name, "Leadership lost");
        }
    }

    /// Clear the holder so a standby can take over without waiting for
    /// the lease to expire.
    async fn release_lease(&self) -> Result<(), LeaderElectionError> {
        let Some(mut lease) = self.store.get(&self.lock_name).await? else {
            debug!(identity = %self.identity, "Lease not found, nothing to release");
            return Ok(());
        };
        if !lease.is_held_by(&self.identity) {
            debug!(identity = %self.identity, "Not the lease holder, nothing to release");
            return Ok(());
        }

        lease.holder = None;
        match self.store.replace(&self.lock_name, lease).await {
            Ok(_) => {
                info!(identity = %self.identity, "Lease released for fast failover");
                Ok(())
            }
            Err(LeaseError::Conflict(_)) | Err(LeaseError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Guard that maintains leadership
///
/// While this guard exists, the elector renews the lease in the background.
/// Use `lost()` to wait for leadership loss. Dropping the guard stops renewal
/// and moves the elector to Lost.
pub struct LeaderGuard {
    elector: Arc<LeaderElector>,
    renewal_task: JoinHandle<()>,
    watch: LeadershipWatch,
}

impl std::fmt::Debug for LeaderGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderGuard").finish_non_exhaustive()
    }
}

impl LeaderGuard {
    /// Wait until leadership is lost
    pub async fn lost(&mut self) {
        self.watch.wait_for_lost().await;
    }

    pub fn is_leader(&self) -> bool {
        self.watch.is_leader()
    }

    pub fn identity(&self) -> &str {
        self.elector.identity()
    }

    /// Give up leadership and hand the lease back.
    pub async fn release(self) -> Result<(), LeaderElectionError> {
        self.renewal_task.abort();
        // Stop acting as leader before anyone else can take the lease.
        self.elector.transition(LeadershipState::Lost);
        self.elector.release_lease().await
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renewal_task.abort();
        if self.elector.transition(LeadershipState::Lost) {
            info!(identity = %self.elector.identity, "Leadership released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::election::MemoryLeaseStore;
    use crate::lifecycle::Shutdown;

    fn fast_timing() -> ElectionTiming {
        ElectionTiming {
            lease_duration: Duration::from_millis(300),
            renew_deadline: Duration::from_millis(200),
            retry_period: Duration::from_millis(20),
        }
    }

    fn elector(store: &MemoryLeaseStore, identity: &str) -> Arc<LeaderElector> {
        Arc::new(LeaderElector::new(
            Arc::new(store.clone()),
            "test-lock",
            identity,
            fast_timing(),
        ))
    }

    #[tokio::test]
    async fn test_acquire_free_lease() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let a = elector(&store, "a");
        assert_eq!(a.state(), LeadershipState::Unknown);

        let guard = a.clone().acquire(shutdown.subscribe()).await.unwrap();
        assert!(guard.is_leader());
        assert_eq!(a.state(), LeadershipState::Leader);
        assert_eq!(store.holder("test-lock").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let _held = elector(&store, "a").acquire(shutdown.subscribe()).await.unwrap();

        let other = Shutdown::new();
        let b = elector(&store, "b");
        let pending = tokio::spawn(b.clone().acquire(other.subscribe()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(b.state(), LeadershipState::Acquiring);

        other.trigger();
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, LeaderElectionError::Cancelled { .. }));
        assert_eq!(b.state(), LeadershipState::Acquiring);
        assert_eq!(store.holder("test-lock").as_deref(), Some("a"));
    }

    /// Store whose create lands the write, then answers late.
    struct SlowCreateStore {
        inner: MemoryLeaseStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl LeaseStore for SlowCreateStore {
        async fn get(&self, name: &str) -> Result<Option<LeaseRecord>, LeaseError> {
            self.inner.get(name).await
        }

        async fn create(&self, name: &str, record: LeaseRecord) -> Result<LeaseRecord, LeaseError> {
            let created = self.inner.create(name, record).await;
            tokio::time::sleep(self.delay).await;
            created
        }

        async fn replace(&self, name: &str, record: LeaseRecord) -> Result<LeaseRecord, LeaseError> {
            self.inner.replace(name, record).await
        }
    }

    #[tokio::test]
    async fn test_cancel_during_create_releases_lease() {
        for delay in [Duration::from_millis(150), Duration::from_secs(2)] {
            let store = MemoryLeaseStore::new();
            let slow = SlowCreateStore {
                inner: store.clone(),
                delay,
            };
            let a = Arc::new(LeaderElector::new(Arc::new(slow), "test-lock", "a", fast_timing()));
            let shutdown = Shutdown::new();
            let pending = tokio::spawn(a.clone().acquire(shutdown.subscribe()));

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(store.holder("test-lock").as_deref(), Some("a"));
            shutdown.trigger();

            let err = tokio::time::timeout(Duration::from_secs(1), pending)
                .await
                .unwrap()
                .unwrap()
                .unwrap_err();
            assert!(matches!(err, LeaderElectionError::Cancelled { .. }));
            assert_eq!(a.state(), LeadershipState::Acquiring);
            assert_eq!(store.holder("test-lock"), None, "delay {delay:?}");

            // A standby does not wait out the lease.
            let b = elector(&store, "b");
            let other = Shutdown::new();
            let guard = tokio::time::timeout(Duration::from_millis(100), b.acquire(other.subscribe()))
                .await
                .unwrap()
                .unwrap();
            assert!(guard.is_leader());
        }
    }

    #[tokio::test]
    async fn test_elector_is_single_use() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let a = elector(&store, "a");
        let guard = a.clone().acquire(shutdown.subscribe()).await.unwrap();
        guard.release().await.unwrap();
        assert_eq!(a.state(), LeadershipState::Lost);

        let err = a.clone().acquire(shutdown.subscribe()).await.unwrap_err();
        assert!(matches!(
            err,
            LeaderElectionError::AlreadyStarted { state: LeadershipState::Lost, .. }
        ));
    }

    #[tokio::test]
    async fn test_release_hands_over_immediately() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let guard = elector(&store, "a").acquire(shutdown.subscribe()).await.unwrap();

        let b = elector(&store, "b");
        let waiting = tokio::spawn(b.clone().acquire(shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(b.state(), LeadershipState::Acquiring);

        guard.release().await.unwrap();
        let guard_b = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(guard_b.is_leader());
        assert_eq!(store.holder("test-lock").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_release_leaves_holderless_lease() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let a = elector(&store, "a");
        let guard = a.clone().acquire(shutdown.subscribe()).await.unwrap();
        let before = store.get("test-lock").await.unwrap().unwrap();

        guard.release().await.unwrap();
        assert_eq!(a.state(), LeadershipState::Lost);
        let after = store.get("test-lock").await.unwrap().unwrap();
        assert_eq!(after.holder, None);
        // Only the holder changes; the lease is free because nobody holds it.
        assert_eq!(after.renew_time, before.renew_time);
        assert!(after.is_expired(Instant::now()));
    }

    #[tokio::test]
    async fn test_renewal_failure_loses_leadership() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let a = elector(&store, "a");
        let mut guard = a.clone().acquire(shutdown.subscribe()).await.unwrap();

        store.set_unavailable(true);
        tokio::time::timeout(Duration::from_secs(2), guard.lost())
            .await
            .expect("leadership should be lost after the renew deadline");
        assert_eq!(a.state(), LeadershipState::Lost);
        assert!(!guard.is_leader());
    }

    #[tokio::test]
    async fn test_drop_marks_lost() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let a = elector(&store, "a");
        let guard = a.clone().acquire(shutdown.subscribe()).await.unwrap();
        drop(guard);
        assert_eq!(a.state(), LeadershipState::Lost);
    }

    #[tokio::test]
    async fn test_takes_over_expired_lease() {
        let store = MemoryLeaseStore::new();
        let shutdown = Shutdown::new();
        let a = elector(&store, "a");
        let guard = a.clone().acquire(shutdown.subscribe()).await.unwrap();
        // Stop renewing without releasing: the lease must expire on its own.
        guard.renewal_task.abort();

        let b = elector(&store, "b");
        let guard_b = tokio::time::timeout(
            Duration::from_secs(2),
            b.clone().acquire(shutdown.subscribe()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(guard_b.is_leader());
        let lease = store.get("test-lock").await.unwrap().unwrap();
        assert_eq!(lease.transitions, 1);
        drop(guard);
    }
}
