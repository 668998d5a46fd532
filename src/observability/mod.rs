//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (leadership, cache sync, watch events, reconciles)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → server.rs (/metrics for Prometheus scrape, /healthz, /readyz)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The metrics endpoint is best-effort: failing to bind never stops startup
//! - The recorder is installed once per process; callers share its handle

pub mod logging;
pub mod metrics;
pub mod server;

pub use server::{TelemetryError, TelemetryHandle, TelemetryServer};
