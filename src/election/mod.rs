//! Leader election subsystem.
//!
//! # Data Flow
//! ```text
//! LeaderElector::acquire (elector.rs):
//!     read lease (lease.rs: LeaseStore)
//!     → absent: create
//!     → ours: renew
//!     → expired: take over (transitions + 1)
//!     → held: sleep retry_period, try again
//!     → Leader: spawn renewal loop, return LeaderGuard
//!
//! Renewal loop:
//!     renew every retry_period
//!     → no success within renew_deadline, or another holder seen: Lost
//! ```
//!
//! # Design Decisions
//! - Exclusivity is the store's job: every write is compare-and-swap on the
//!   record version, a conflict simply means "not acquired"
//! - LeadershipState has one writer (the elector), published over a watch
//!   channel
//! - Lost is terminal; an elector is never reused within a process

pub mod elector;
pub mod lease;
pub mod state;

pub use elector::{ElectionTiming, LeaderElectionError, LeaderElector, LeaderGuard};
pub use lease::{LeaseError, LeaseRecord, LeaseStore, MemoryLeaseStore};
pub use state::{LeadershipState, LeadershipWatch};
