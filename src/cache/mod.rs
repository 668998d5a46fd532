//! Watch cache subsystem.
//!
//! # Data Flow
//! ```text
//! WatchCache::start (watch.rs):
//!     one reflector task per registered kind
//!     → source.rs: list_and_watch(kind)
//!     → replace the kind's store, mark synced (sync.rs)
//!     → follow the watch stream, apply events
//!     → forward ObjectRefs to the runner queue
//!
//! WatchCache::wait_for_sync:
//!     sync.rs aggregate (AND over every kind) or shutdown
//! ```
//!
//! # Design Decisions
//! - The kind set is fixed at construction (the registry is frozen by then)
//! - AllSynced is monotonic: re-lists after a broken watch never unsync
//! - The cache itself never times out a sync; callers choose a deadline

pub mod resource;
pub mod source;
pub mod sync;
pub mod watch;

pub use resource::{ObjectRef, Resource, WatchEvent};
pub use source::{MemorySource, WatchError, WatchSource, WatchStream};
pub use sync::SyncTracker;
pub use watch::WatchCache;
