//! Controller registration and the reconcile runner.
//!
//! # Data Flow
//! ```text
//! Registration (controller.rs):
//!     Controller::kinds → checked against the frozen KindSet → ControllerSet
//!
//! Runtime (runner.rs):
//!     cache events / requeues → ObjectRef queue
//!     → gate check (Leader and AllSynced)
//!     → every controller watching the kind
//!     → Done | RequeueAfter | error (exponential backoff)
//! ```
//!
//! # Design Decisions
//! - Controllers can only watch registered kinds; anything else fails startup
//! - The runner stops on shutdown or leadership loss, whichever comes first

pub mod controller;
pub mod defaults;
pub mod runner;

pub use controller::{Action, Controller, ControllerError, ControllerSet, FnController, ReconcileError};
pub use runner::{RunOutcome, Runner};
