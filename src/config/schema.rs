//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::election::ElectionTiming;

/// Name of the lease every replica contends for.
pub const DEFAULT_LOCK_NAME: &str = "project-operator-lock";

/// Root configuration for the manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Leader election settings.
    pub leader_election: LeaderElectionConfig,

    /// Metrics endpoint settings.
    pub metrics: MetricsConfig,

    /// Watch cache settings.
    pub cache: CacheConfig,

    /// Shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Leader election configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LeaderElectionConfig {
    /// Lease name shared by every replica.
    pub lock_name: String,

    /// Replica identity. Falls back to `POD_NAME`, `HOSTNAME`, then a random UUID.
    pub identity: Option<String>,

    /// Lease validity without renewal, in milliseconds.
    pub lease_duration_ms: u64,

    /// How long the leader keeps retrying renewals before giving up, in milliseconds.
    pub renew_deadline_ms: u64,

    /// Interval between acquisition attempts and renewals, in milliseconds.
    pub retry_period_ms: u64,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            identity: None,
            lease_duration_ms: 15_000,
            renew_deadline_ms: 10_000,
            retry_period_ms: 2_000,
        }
    }
}

impl LeaderElectionConfig {
    pub fn timing(&self) -> ElectionTiming {
        ElectionTiming {
            lease_duration: Duration::from_millis(self.lease_duration_ms),
            renew_deadline: Duration::from_millis(self.renew_deadline_ms),
            retry_period: Duration::from_millis(self.retry_period_ms),
        }
    }

    /// The configured identity, or one derived from the environment.
    pub fn resolve_identity(&self) -> String {
        self.identity
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| std::env::var("POD_NAME").ok().filter(|id| !id.is_empty()))
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|id| !id.is_empty()))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the metrics endpoint.
    pub enabled: bool,

    /// Bind host (IP address).
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8383,
        }
    }
}

impl MetricsConfig {
    pub fn address(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Watch cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace to watch. Empty watches all namespaces.
    pub namespace: String,

    /// Maximum wait for the initial sync, in milliseconds. 0 waits forever.
    pub sync_timeout_ms: u64,

    /// Capacity of the reconcile queue.
    pub event_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            sync_timeout_ms: 120_000,
            event_buffer: 1024,
        }
    }
}

impl CacheConfig {
    pub fn namespace(&self) -> Option<String> {
        Some(self.namespace.clone()).filter(|ns| !ns.is_empty())
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.sync_timeout_ms)).filter(|t| !t.is_zero())
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for background tasks after the signal, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 10_000,
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
