//! Access to remote resource state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::cache::{ObjectRef, Resource, WatchEvent};
use crate::registry::Kind;

/// Stream of changes following a list.
///
/// A `Lagged` error means events were dropped; the reader must re-list.
pub type WatchStream = broadcast::Receiver<WatchEvent>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("watch source unavailable: {0}")]
    Unavailable(String),
}

/// List+watch access to the backing state service.
#[async_trait]
pub trait WatchSource: Send + Sync + 'static {
    /// Return every current object of `kind` together with a stream of the
    /// changes that happen after the snapshot.
    async fn list_and_watch(&self, kind: &Kind) -> Result<(Vec<Resource>, WatchStream), WatchError>;
}

/// Buffered events per kind before watchers start lagging.
const WATCH_BUFFER: usize = 256;

type ObjectKey = (Option<String>, String);

/// Process-local watch source.
///
/// Clones share state. Lists of a kind can be held back with [`hold`] to
/// simulate a slow initial sync.
///
/// [`hold`]: MemorySource::hold
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<SourceInner>,
}

#[derive(Default)]
struct SourceInner {
    kinds: DashMap<Kind, KindState>,
    unavailable: AtomicBool,
    next_version: AtomicU64,
}

struct KindState {
    objects: BTreeMap<ObjectKey, Resource>,
    events: broadcast::Sender<WatchEvent>,
    ready: watch::Sender<bool>,
}

impl KindState {
    fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        let (ready, _) = watch::channel(true);
        Self {
            objects: BTreeMap::new(),
            events,
            ready,
        }
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block lists of `kind` until [`release`](MemorySource::release).
    pub fn hold(&self, kind: &Kind) {
        self.with_state(kind, |state| state.ready.send_replace(false));
    }

    pub fn release(&self, kind: &Kind) {
        self.with_state(kind, |state| state.ready.send_replace(true));
    }

    /// Make lists fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Create or update an object and notify watchers.
    pub fn apply(&self, mut resource: Resource) -> Resource {
        resource.resource_version = self.inner.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let kind = resource.kind.clone();
        self.with_state(&kind, |state| {
            let key = (resource.namespace.clone(), resource.name.clone());
            state.objects.insert(key, resource.clone());
            let _ = state.events.send(WatchEvent::Applied(resource.clone()));
        });
        resource
    }

    /// Delete an object and notify watchers.
    pub fn delete(&self, object: &ObjectRef) -> Option<Resource> {
        self.with_state(&object.kind, |state| {
            let key = (object.namespace.clone(), object.name.clone());
            let removed = state.objects.remove(&key)?;
            let _ = state.events.send(WatchEvent::Deleted(removed.clone()));
            Some(removed)
        })
    }

    /// Number of stored objects of `kind`.
    pub fn len(&self, kind: &Kind) -> usize {
        self.inner
            .kinds
            .get(kind)
            .map(|state| state.objects.len())
            .unwrap_or(0)
    }

    fn with_state<R>(&self, kind: &Kind, f: impl FnOnce(&mut KindState) -> R) -> R {
        let mut state = self
            .inner
            .kinds
            .entry(kind.clone())
            .or_insert_with(KindState::new);
        f(&mut state)
    }

    fn check_available(&self) -> Result<(), WatchError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            Err(WatchError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WatchSource for MemorySource {
    async fn list_and_watch(&self, kind: &Kind) -> Result<(Vec<Resource>, WatchStream), WatchError> {
        self.check_available()?;

        let mut ready = self.with_state(kind, |state| state.ready.subscribe());
        let released = ready.wait_for(|ready| *ready).await.is_ok();
        if !released {
            return Err(WatchError::Unavailable("source dropped".to_string()));
        }
        self.check_available()?;

        // Snapshot and subscribe under the same entry lock so no event falls
        // between the list and the watch.
        Ok(self.with_state(kind, |state| {
            (
                state.objects.values().cloned().collect(),
                state.events.subscribe(),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn kind() -> Kind {
        Kind::new("gcp.managed.openshift.io", "v1alpha1", "ProjectClaim")
    }

    #[tokio::test]
    async fn test_list_then_watch_sees_later_changes() {
        let source = MemorySource::new();
        source.apply(Resource::new(kind(), Some("ns"), "a", serde_json::json!({})));

        let (objects, mut stream) = source.list_and_watch(&kind()).await.unwrap();
        assert_eq!(objects.len(), 1);

        let b = source.apply(Resource::new(kind(), Some("ns"), "b", serde_json::json!({})));
        assert_eq!(stream.recv().await.unwrap(), WatchEvent::Applied(b.clone()));

        source.delete(&b.object_ref());
        assert!(matches!(stream.recv().await.unwrap(), WatchEvent::Deleted(_)));
        assert_eq!(source.len(&kind()), 1);
    }

    #[tokio::test]
    async fn test_hold_blocks_list_until_release() {
        let source = MemorySource::new();
        source.hold(&kind());

        let blocked = tokio::time::timeout(Duration::from_millis(50), source.list_and_watch(&kind())).await;
        assert!(blocked.is_err());

        source.release(&kind());
        let listed = tokio::time::timeout(Duration::from_millis(500), source.list_and_watch(&kind())).await;
        assert!(listed.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_versions_increase() {
        let source = MemorySource::new();
        let a = source.apply(Resource::new(kind(), None, "a", serde_json::Value::Null));
        let b = source.apply(Resource::new(kind(), None, "a", serde_json::Value::Null));
        assert!(b.resource_version > a.resource_version);
        assert_eq!(source.len(&kind()), 1);
    }
}
