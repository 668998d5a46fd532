//! Type registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     groups.rs (scheme groups: operator API, hive)
//!     → TypeRegistry::register_group (rejects duplicates)
//!     → TypeRegistry::freeze
//!     → KindSet (immutable, shared by cache and controllers)
//! ```
//!
//! # Design Decisions
//! - Duplicate registration is a fatal configuration error, never a no-op
//! - Freezing consumes the builder; a KindSet has no mutating methods
//! - Kind identity is the (group, version, kind) triple

pub mod groups;
pub mod kind;
pub mod table;

pub use kind::Kind;
pub use table::{KindSet, RegistryError, TypeRegistry};
