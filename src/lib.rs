//! Project operator bootstrap library.
//!
//! Brings a singleton operator up in a safe order: leadership first, then the
//! type registry, the watch cache and telemetry, and only once every kind has
//! synced, the controllers.

// Gates
pub mod election;
pub mod cache;

// Wiring
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod registry;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;

pub use config::ManagerConfig;
pub use error::BootstrapError;
pub use lifecycle::{Bootstrap, LifecycleContext, Shutdown};
