//! Per-kind sync status and the AllSynced aggregate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::lifecycle::ShutdownListener;
use crate::registry::{Kind, KindSet};

/// Tracks which kinds finished their initial list.
///
/// Flags only go `false -> true`, so AllSynced never reverts once published.
pub struct SyncTracker {
    flags: BTreeMap<Kind, AtomicBool>,
    all: watch::Sender<bool>,
}

impl SyncTracker {
    /// An empty kind set is vacuously synced.
    pub fn new(kinds: &KindSet) -> Self {
        let flags = kinds
            .iter()
            .map(|kind| (kind.clone(), AtomicBool::new(false)))
            .collect::<BTreeMap<_, _>>();
        let (all, _) = watch::channel(flags.is_empty());
        Self { flags, all }
    }

    /// Mark `kind` synced. Returns `true` if this call changed its status.
    /// Unknown kinds are ignored.
    pub fn mark_synced(&self, kind: &Kind) -> bool {
        let Some(flag) = self.flags.get(kind) else {
            return false;
        };
        let newly = !flag.swap(true, Ordering::SeqCst);
        if newly && self.flags.values().all(|f| f.load(Ordering::SeqCst)) {
            self.all.send_if_modified(|all| !std::mem::replace(all, true));
        }
        newly
    }

    pub fn is_synced(&self, kind: &Kind) -> bool {
        self.flags
            .get(kind)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn all_synced(&self) -> bool {
        *self.all.borrow()
    }

    /// Kinds that have not synced yet.
    pub fn pending(&self) -> Vec<Kind> {
        self.flags
            .iter()
            .filter(|(_, flag)| !flag.load(Ordering::SeqCst))
            .map(|(kind, _)| kind.clone())
            .collect()
    }

    /// Wait for AllSynced. Returns `false` if `shutdown` fires first.
    pub async fn wait(&self, shutdown: &mut ShutdownListener) -> bool {
        let mut all = self.all.subscribe();
        tokio::select! {
            biased;
            _ = shutdown.recv() => false,
            synced = async { all.wait_for(|synced| *synced).await.is_ok() } => synced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::registry::TypeRegistry;
    use std::time::Duration;

    fn kinds(names: &[&str]) -> KindSet {
        let mut registry = TypeRegistry::new();
        for name in names {
            registry.register(Kind::new("a.io", "v1", *name)).unwrap();
        }
        registry.freeze()
    }

    #[test]
    fn test_all_synced_iff_every_kind_synced() {
        let set = kinds(&["A", "B", "C"]);
        let tracker = SyncTracker::new(&set);
        let all: Vec<_> = set.iter().cloned().collect();

        assert!(!tracker.all_synced());
        assert!(tracker.mark_synced(&all[0]));
        assert!(!tracker.all_synced());
        assert!(tracker.mark_synced(&all[2]));
        assert!(!tracker.all_synced());
        assert_eq!(tracker.pending(), vec![all[1].clone()]);

        assert!(tracker.mark_synced(&all[1]));
        assert!(tracker.all_synced());
        assert!(tracker.pending().is_empty());
    }

    #[test]
    fn test_mark_is_idempotent_and_ignores_unknown() {
        let set = kinds(&["A"]);
        let tracker = SyncTracker::new(&set);
        let a = set.iter().next().unwrap().clone();

        assert!(!tracker.mark_synced(&Kind::new("b.io", "v1", "Other")));
        assert!(!tracker.all_synced());
        assert!(tracker.mark_synced(&a));
        assert!(!tracker.mark_synced(&a));
        assert!(tracker.all_synced());
    }

    #[test]
    fn test_empty_set_is_synced() {
        let tracker = SyncTracker::new(&kinds(&[]));
        assert!(tracker.all_synced());
    }

    #[tokio::test]
    async fn test_wait_returns_false_on_shutdown() {
        let tracker = SyncTracker::new(&kinds(&["A"]));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();
        shutdown.trigger();
        assert!(!tracker.wait(&mut listener).await);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_last_kind() {
        let set = kinds(&["A", "B"]);
        let tracker = std::sync::Arc::new(SyncTracker::new(&set));
        let shutdown = Shutdown::new();

        let waiter = {
            let tracker = tracker.clone();
            let mut listener = shutdown.subscribe();
            tokio::spawn(async move { tracker.wait(&mut listener).await })
        };

        for kind in set.iter() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tracker.mark_synced(kind);
        }
        assert!(tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap());
    }
}
