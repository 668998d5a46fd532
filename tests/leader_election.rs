//! Several replicas contending for one lock.

use std::sync::Arc;
use std::time::Duration;

use project_operator::election::{LeaderElector, LeaseStore, MemoryLeaseStore};
use project_operator::Shutdown;

mod common;
use common::{fast_config, wait_until, within};

const REPLICAS: usize = 3;

fn contenders(store: &MemoryLeaseStore) -> Vec<Arc<LeaderElector>> {
    let config = fast_config();
    (0..REPLICAS)
        .map(|i| {
            let store: Arc<dyn LeaseStore> = Arc::new(store.clone());
            Arc::new(LeaderElector::new(
                store,
                &config.leader_election.lock_name,
                &format!("replica-{i}"),
                config.leader_election.timing(),
            ))
        })
        .collect()
}

fn leaders(electors: &[Arc<LeaderElector>]) -> usize {
    electors.iter().filter(|e| e.state().is_leader()).count()
}

#[tokio::test]
async fn test_at_most_one_leader_across_handover() {
    let store = MemoryLeaseStore::new();
    let electors = contenders(&store);
    let shutdown = Shutdown::new();

    let tasks: Vec<_> = electors
        .iter()
        .map(|elector| {
            let elector = Arc::clone(elector);
            let listener = shutdown.subscribe();
            tokio::spawn(async move { elector.acquire(listener).await })
        })
        .collect();

    assert!(wait_until(Duration::from_secs(5), || tasks.iter().any(|t| t.is_finished())).await);
    assert_eq!(leaders(&electors), 1);
    for _ in 0..20 {
        assert!(leaders(&electors) <= 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Hand over: the first winner releases, exactly one standby follows
    let mut pending = Vec::new();
    let mut first = None;
    for task in tasks {
        if first.is_none() && task.is_finished() {
            first = Some(task.await.unwrap().unwrap());
        } else {
            pending.push(task);
        }
    }
    let first = first.expect("one contender acquired");
    let first_identity = first.identity().to_string();
    first.release().await.unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || {
            store
                .holder(&fast_config().leader_election.lock_name)
                .is_some_and(|holder| holder != first_identity)
        })
        .await
    );
    for _ in 0..20 {
        assert!(leaders(&electors) <= 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The remaining standby gives up on shutdown
    shutdown.trigger();
    let mut cancelled = 0;
    let mut guards = Vec::new();
    for task in pending {
        match within(Duration::from_secs(5), task).await.unwrap() {
            Ok(guard) => guards.push(guard),
            Err(_) => cancelled += 1,
        }
    }
    assert_eq!(guards.len(), 1);
    assert_eq!(cancelled, REPLICAS - 2);
}
