//! The watch cache and its per-kind reflectors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::{ObjectRef, Resource, SyncTracker, WatchEvent, WatchSource};
use crate::lifecycle::{Shutdown, ShutdownListener};
use crate::observability::metrics;
use crate::registry::{Kind, KindSet};
use crate::resilience::backoff::calculate_backoff;

const RELIST_BASE_DELAY: Duration = Duration::from_millis(200);
const RELIST_MAX_DELAY: Duration = Duration::from_secs(30);

type ObjectKey = (Option<String>, String);

/// Local mirror of every registered kind.
pub struct WatchCache {
    kinds: KindSet,
    source: Arc<dyn WatchSource>,
    /// `None` watches every namespace.
    namespace: Option<String>,
    stores: HashMap<Kind, DashMap<ObjectKey, Resource>>,
    sync: SyncTracker,
    events: mpsc::Sender<ObjectRef>,
    started: AtomicBool,
}

impl WatchCache {
    /// Build a cache for `kinds`. Every object that changes is sent to
    /// `events` once its kind has synced.
    pub fn new(
        kinds: KindSet,
        source: Arc<dyn WatchSource>,
        namespace: Option<String>,
        events: mpsc::Sender<ObjectRef>,
    ) -> Self {
        let stores = kinds
            .iter()
            .map(|kind| (kind.clone(), DashMap::new()))
            .collect();
        let sync = SyncTracker::new(&kinds);
        metrics::record_cache_kinds(kinds.len());
        metrics::record_cache_synced(sync.all_synced());
        Self {
            kinds,
            source,
            namespace,
            stores,
            sync,
            events,
            started: AtomicBool::new(false),
        }
    }

    /// Spawn one reflector per kind. Only the first call starts anything.
    pub fn start(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Watch cache already started");
            return Vec::new();
        }

        tracing::info!(
            kinds = self.kinds.len(),
            namespace = self.namespace.as_deref().unwrap_or("<all>"),
            "Starting watch cache"
        );

        self.kinds
            .iter()
            .map(|kind| {
                let cache = Arc::clone(self);
                let kind = kind.clone();
                let listener = shutdown.subscribe();
                tokio::spawn(async move { cache.reflect(kind, listener).await })
            })
            .collect()
    }

    /// Block until every kind synced (`true`) or shutdown fires (`false`).
    pub async fn wait_for_sync(&self, mut shutdown: ShutdownListener) -> bool {
        self.sync.wait(&mut shutdown).await
    }

    pub fn all_synced(&self) -> bool {
        self.sync.all_synced()
    }

    pub fn is_synced(&self, kind: &Kind) -> bool {
        self.sync.is_synced(kind)
    }

    /// Kinds still waiting for their initial list.
    pub fn pending(&self) -> Vec<Kind> {
        self.sync.pending()
    }

    pub fn kinds(&self) -> &KindSet {
        &self.kinds
    }

    pub fn get(&self, object: &ObjectRef) -> Option<Resource> {
        let store = self.stores.get(&object.kind)?;
        store
            .get(&(object.namespace.clone(), object.name.clone()))
            .map(|entry| entry.value().clone())
    }

    /// Every cached object of `kind`, ordered by namespace and name.
    pub fn list(&self, kind: &Kind) -> Vec<Resource> {
        let mut objects: Vec<Resource> = self
            .stores
            .get(kind)
            .map(|store| store.iter().map(|entry| entry.value().clone()).collect())
            .unwrap_or_default();
        objects.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        objects
    }

    /// Cluster-scoped objects are always visible.
    fn in_scope(&self, resource: &Resource) -> bool {
        match (&self.namespace, &resource.namespace) {
            (Some(watched), Some(ns)) => watched == ns,
            _ => true,
        }
    }

    async fn reflect(self: Arc<Self>, kind: Kind, mut shutdown: ShutdownListener) {
        let mut failures = 0u32;
        loop {
            if failures > 0 {
                let delay = calculate_backoff(failures, RELIST_BASE_DELAY, RELIST_MAX_DELAY);
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let listed = tokio::select! {
                biased;
                _ = shutdown.recv() => return,
                listed = self.source.list_and_watch(&kind) => listed,
            };
            let (objects, mut stream) = match listed {
                Ok(listed) => listed,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(kind = %kind, error = %e, attempt = failures, "List failed, retrying");
                    continue;
                }
            };
            failures = 0;

            let changed = self.replace(&kind, objects);
            if self.sync.mark_synced(&kind) {
                tracing::info!(kind = %kind, objects = changed.len(), "Kind synced");
                if self.sync.all_synced() {
                    metrics::record_cache_synced(true);
                    tracing::info!("All kinds synced");
                }
            }
            for object in changed {
                if !self.enqueue(object, &mut shutdown).await {
                    return;
                }
            }

            loop {
                let event = tokio::select! {
                    biased;
                    _ = shutdown.recv() => return,
                    event = stream.recv() => event,
                };
                match event {
                    Ok(event) => {
                        if let Some(object) = self.apply(&kind, event) {
                            if !self.enqueue(object, &mut shutdown).await {
                                return;
                            }
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(kind = %kind, missed, "Watch fell behind, re-listing");
                        break;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!(kind = %kind, "Watch closed, re-listing");
                        failures = 1;
                        break;
                    }
                }
            }
        }
    }

    /// Replace the store of `kind` with a fresh list. Returns every object
    /// that is present now plus every object that disappeared.
    fn replace(&self, kind: &Kind, objects: Vec<Resource>) -> Vec<ObjectRef> {
        let Some(store) = self.stores.get(kind) else {
            return Vec::new();
        };

        let fresh: HashMap<ObjectKey, Resource> = objects
            .into_iter()
            .filter(|r| r.kind == *kind && self.in_scope(r))
            .map(|r| ((r.namespace.clone(), r.name.clone()), r))
            .collect();

        let mut changed: Vec<ObjectRef> = store
            .iter()
            .filter(|entry| !fresh.contains_key(entry.key()))
            .map(|entry| entry.value().object_ref())
            .collect();
        store.retain(|key, _| fresh.contains_key(key));

        for (key, resource) in fresh {
            changed.push(resource.object_ref());
            store.insert(key, resource);
        }
        changed
    }

    /// Apply one watch event. Returns the object to reconcile, if any.
    fn apply(&self, kind: &Kind, event: WatchEvent) -> Option<ObjectRef> {
        let resource = event.resource();
        if resource.kind != *kind || !self.in_scope(resource) {
            return None;
        }
        let store = self.stores.get(kind)?;
        metrics::record_watch_event(kind, event.label());

        let key = (resource.namespace.clone(), resource.name.clone());
        let object = resource.object_ref();
        match event {
            WatchEvent::Applied(resource) => {
                let stale = store
                    .get(&key)
                    .is_some_and(|current| current.resource_version > resource.resource_version);
                if stale {
                    return None;
                }
                store.insert(key, resource);
            }
            WatchEvent::Deleted(_) => {
                store.remove(&key);
            }
        }
        Some(object)
    }

    async fn enqueue(&self, object: ObjectRef, shutdown: &mut ShutdownListener) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.recv() => false,
            sent = self.events.send(object) => sent.is_ok(),
        }
    }
}
