//! Lease records and the store that arbitrates them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

/// Errors returned by a [`LeaseStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaseError {
    /// The record changed (or was created) since it was read.
    #[error("lease {0} was modified concurrently")]
    Conflict(String),

    #[error("lease {0} not found")]
    NotFound(String),

    /// The coordination service could not be reached.
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
}

/// One lease as stored by the coordination service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    /// Identity of the current holder, `None` once released.
    pub holder: Option<String>,
    pub lease_duration: Duration,
    pub acquire_time: Instant,
    pub renew_time: Instant,
    /// Number of times the lease changed hands.
    pub transitions: u32,
    /// Version assigned by the store on every write. Writers send back the
    /// version they read; a mismatch is a [`LeaseError::Conflict`].
    pub version: u64,
}

impl LeaseRecord {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.holder.is_none() || now > self.renew_time + self.lease_duration
    }

    pub fn is_held_by(&self, identity: &str) -> bool {
        self.holder.as_deref() == Some(identity)
    }
}

/// The distributed lock primitive.
///
/// Implementations own the lease semantics of the backing service; the
/// elector only relies on `create` and `replace` being atomic
/// compare-and-swap operations.
#[async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    async fn get(&self, name: &str) -> Result<Option<LeaseRecord>, LeaseError>;

    /// Create the lease. Fails with `Conflict` if it already exists.
    async fn create(&self, name: &str, record: LeaseRecord) -> Result<LeaseRecord, LeaseError>;

    /// Replace the lease if its stored version still equals `record.version`.
    async fn replace(&self, name: &str, record: LeaseRecord) -> Result<LeaseRecord, LeaseError>;
}

/// Process-local lease store.
///
/// Clones share the same table, so several electors in one process contend
/// exactly like replicas against a real coordination service. Supports
/// simulated outages for failure testing.
#[derive(Clone, Default)]
pub struct MemoryLeaseStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    leases: Mutex<HashMap<String, LeaseRecord>>,
    unavailable: AtomicBool,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current holder of `name`, if any.
    pub fn holder(&self, name: &str) -> Option<String> {
        self.lock()
            .get(name)
            .and_then(|record| record.holder.clone())
    }

    fn check_available(&self) -> Result<(), LeaseError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            Err(LeaseError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, LeaseRecord>> {
        // A poisoned table is still consistent: every write is a single insert.
        self.inner
            .leases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn get(&self, name: &str) -> Result<Option<LeaseRecord>, LeaseError> {
        self.check_available()?;
        Ok(self.lock().get(name).cloned())
    }

    async fn create(&self, name: &str, mut record: LeaseRecord) -> Result<LeaseRecord, LeaseError> {
        self.check_available()?;
        let mut leases = self.lock();
        if leases.contains_key(name) {
            return Err(LeaseError::Conflict(name.to_string()));
        }
        record.version = 1;
        leases.insert(name.to_string(), record.clone());
        Ok(record)
    }

    async fn replace(&self, name: &str, mut record: LeaseRecord) -> Result<LeaseRecord, LeaseError> {
        self.check_available()?;
        let mut leases = self.lock();
        let current = leases
            .get(name)
            .ok_or_else(|| LeaseError::NotFound(name.to_string()))?;
        if current.version != record.version {
            return Err(LeaseError::Conflict(name.to_string()));
        }
        record.version = current.version + 1;
        leases.insert(name.to_string(), record.clone());
        Ok(record)
    }
}
