//! Lifecycle context shared by every component.
//!
//! Replaces process-wide flags: the leadership view, the frozen registry, the
//! cache (for its sync view) and the shutdown handle live here and are handed
//! to components explicitly.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use crate::cache::WatchCache;
use crate::election::{LeadershipState, LeadershipWatch};
use crate::lifecycle::Shutdown;
use crate::registry::KindSet;

#[derive(Clone)]
pub struct LifecycleContext {
    shutdown: Shutdown,
    leadership: LeadershipWatch,
    registry: Arc<OnceLock<KindSet>>,
    cache: Arc<OnceLock<Arc<WatchCache>>>,
    telemetry_addr: Arc<OnceLock<SocketAddr>>,
}

impl LifecycleContext {
    pub fn new(shutdown: Shutdown, leadership: LeadershipWatch) -> Self {
        Self {
            shutdown,
            leadership,
            registry: Arc::new(OnceLock::new()),
            cache: Arc::new(OnceLock::new()),
            telemetry_addr: Arc::new(OnceLock::new()),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn leadership(&self) -> LeadershipState {
        self.leadership.current()
    }

    pub fn leadership_watch(&self) -> LeadershipWatch {
        self.leadership.clone()
    }

    /// The frozen registry, once the registration phase is over.
    pub fn registry(&self) -> Option<&KindSet> {
        self.registry.get()
    }

    /// Publish the frozen registry. Only the first call has an effect.
    pub(crate) fn set_registry(&self, kinds: KindSet) -> bool {
        self.registry.set(kinds).is_ok()
    }

    pub fn cache(&self) -> Option<&Arc<WatchCache>> {
        self.cache.get()
    }

    pub(crate) fn set_cache(&self, cache: Arc<WatchCache>) -> bool {
        self.cache.set(cache).is_ok()
    }

    /// Address the telemetry endpoint is bound to, once it is serving.
    pub fn telemetry_addr(&self) -> Option<SocketAddr> {
        self.telemetry_addr.get().copied()
    }

    pub(crate) fn set_telemetry_addr(&self, addr: SocketAddr) -> bool {
        self.telemetry_addr.set(addr).is_ok()
    }

    /// AllSynced. False until the cache exists.
    pub fn all_synced(&self) -> bool {
        self.cache().is_some_and(|cache| cache.all_synced())
    }

    /// Both reconciliation gates hold: Leader and AllSynced.
    pub fn is_ready(&self) -> bool {
        self.leadership().is_leader() && self.all_synced()
    }
}
