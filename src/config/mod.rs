//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! manager.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → owned by the Bootstrap
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the bootstrap is built
//! - All fields have defaults so an empty file (or no file) is valid
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{LogFormat, ManagerConfig};
pub use validation::{validate_config, ValidationError};
