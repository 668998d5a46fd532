//! Metrics collection and exposition.
//!
//! # Metrics
//! - `operator_leader` (gauge): 1 while this replica holds the lease
//! - `operator_leader_transitions_total` (counter): times this replica became leader
//! - `operator_cache_kinds` (gauge): number of kinds mirrored by the cache
//! - `operator_cache_synced` (gauge): 1 once every kind finished its initial list
//! - `operator_watch_events_total` (counter): events by kind and type
//! - `operator_reconcile_total` (counter): reconciles by controller and result
//! - `operator_reconcile_duration_seconds` (histogram): reconcile latency
//!
//! # Design Decisions
//! - Recording is a no-op until the recorder is installed
//! - The recorder is installed lazily and at most once per process

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::election::LeadershipState;
use crate::registry::Kind;

const LEADER: &str = "operator_leader";
const LEADER_TRANSITIONS: &str = "operator_leader_transitions_total";
const CACHE_KINDS: &str = "operator_cache_kinds";
const CACHE_SYNCED: &str = "operator_cache_synced";
const WATCH_EVENTS: &str = "operator_watch_events_total";
const RECONCILE_TOTAL: &str = "operator_reconcile_total";
const RECONCILE_DURATION: &str = "operator_reconcile_duration_seconds";

/// Reconcile latency buckets, in seconds.
const RECONCILE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
pub fn recorder_handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full(RECONCILE_DURATION.to_string()),
                    RECONCILE_BUCKETS,
                )
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Invalid histogram buckets, using summaries");
                    PrometheusBuilder::new()
                });
            let recorder = builder.build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A global metrics recorder is already installed");
            }
            describe_metrics();
            handle
        })
        .clone()
}

fn describe_metrics() {
    describe_gauge!(LEADER, "Whether this replica currently holds the leader lease");
    describe_counter!(LEADER_TRANSITIONS, "Number of times this replica became leader");
    describe_gauge!(CACHE_KINDS, "Number of resource kinds mirrored by the watch cache");
    describe_gauge!(CACHE_SYNCED, "Whether every mirrored kind completed its initial list");
    describe_counter!(WATCH_EVENTS, "Watch events applied to the cache");
    describe_counter!(RECONCILE_TOTAL, "Reconcile calls by controller and result");
    describe_histogram!(RECONCILE_DURATION, "Time spent in reconcile calls");
}

/// Record a leadership state transition.
pub fn record_leadership(state: LeadershipState) {
    gauge!(LEADER).set(if state.is_leader() { 1.0 } else { 0.0 });
    if state.is_leader() {
        counter!(LEADER_TRANSITIONS).increment(1);
    }
}

pub fn record_cache_kinds(count: usize) {
    gauge!(CACHE_KINDS).set(count as f64);
}

pub fn record_cache_synced(synced: bool) {
    gauge!(CACHE_SYNCED).set(if synced { 1.0 } else { 0.0 });
}

pub fn record_watch_event(kind: &Kind, event: &'static str) {
    counter!(WATCH_EVENTS, "kind" => kind.kind.clone(), "event" => event).increment(1);
}

/// Record a completed reconcile call.
pub fn record_reconcile(controller: &str, result: &'static str, start: Instant) {
    counter!(RECONCILE_TOTAL, "controller" => controller.to_string(), "result" => result)
        .increment(1);
    histogram!(RECONCILE_DURATION, "controller" => controller.to_string())
        .record(start.elapsed().as_secs_f64());
}
