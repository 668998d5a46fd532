//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Failed lease attempt / failed list / failed reconcile:
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Every retry loop sleeps with jitter so replicas do not synchronize
//! - Delays are capped; callers also select on the shutdown signal

pub mod backoff;
