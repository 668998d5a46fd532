//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Acquire leadership → Register kinds → Start cache + telemetry
//!     → Wait for sync → Run controllers
//!
//! Shutdown (shutdown.rs):
//!     Trigger → every listener wakes → drain tasks → release lease → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//!     second signal → forced exit
//!
//! Context (context.rs):
//!     leadership view + registry + cache, handed to components explicitly
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing informer-related starts before leadership
//! - Reconciliation requires Leader and AllSynced, checked on every dispatch
//! - Drain has a deadline; stragglers are aborted

pub mod context;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use context::LifecycleContext;
pub use shutdown::{Shutdown, ShutdownListener};
pub use startup::{Bootstrap, BootstrapBuilder};
