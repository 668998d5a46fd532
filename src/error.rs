//! Top-level bootstrap error.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::election::LeaderElectionError;
use crate::manager::ControllerError;
use crate::registry::{Kind, RegistryError};

/// Every way the bootstrap can fail. All variants are fatal.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("leader election failed: {0}")]
    LeaderElection(#[from] LeaderElectionError),

    #[error("type registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("controller registration failed: {0}")]
    Controller(#[from] ControllerError),

    #[error("cache sync cancelled by shutdown")]
    SyncCancelled,

    #[error("cache did not sync within {timeout:?}; pending kinds: {}", format_kinds(.pending))]
    SyncTimeout { timeout: Duration, pending: Vec<Kind> },

    #[error("leadership lost")]
    LeadershipLost,
}

fn format_kinds(kinds: &[Kind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
