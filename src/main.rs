//! Project operator manager.
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGTERM/SIGINT ──▶ signals ──▶ Shutdown ──────────────────────────┐
//!                                                                      │
//!   ┌──────────────────────────── Bootstrap ────────────────────────┐ │
//!   │                                                                │ │
//!   │  election ──Leader──▶ registry ──freeze──▶ cache ──synced──┐   │◀┘
//!   │   (lease)              (kinds)             (reflectors)    │   │
//!   │                                              │             ▼   │
//!   │                                          telemetry      manager│
//!   │                                       /metrics /readyz  (runner)│
//!   └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exit status is zero only after a clean shutdown. Any bootstrap failure
//! (election, registration, sync, lease loss) exits non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use project_operator::cache::MemorySource;
use project_operator::config::{load_config, validate_config, ConfigError, LogFormat, ManagerConfig};
use project_operator::election::MemoryLeaseStore;
use project_operator::lifecycle::signals;
use project_operator::manager::defaults::default_controllers;
use project_operator::observability::logging::init_logging;
use project_operator::observability::metrics;
use project_operator::registry::groups::default_groups;
use project_operator::{Bootstrap, Shutdown};

#[derive(Parser)]
#[command(name = "manager")]
#[command(about = "Leader-elected manager for the project operator", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "OPERATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Replica identity used for leader election
    #[arg(long, env = "OPERATOR_IDENTITY")]
    identity: Option<String>,

    /// Metrics bind host
    #[arg(long)]
    metrics_host: Option<String>,

    /// Metrics bind port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Namespace to watch (empty watches all)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn load(&self) -> Result<ManagerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ManagerConfig::default(),
        };

        if let Some(identity) = &self.identity {
            config.leader_election.identity = Some(identity.clone());
        }
        if let Some(host) = &self.metrics_host {
            config.metrics.host = host.clone();
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = port;
        }
        if let Some(namespace) = &self.namespace {
            config.cache.namespace = namespace.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            // The configured subscriber is unknown; report with the defaults.
            let _ = init_logging("info", cli.log_format.unwrap_or_default());
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    )?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "project-operator manager starting"
    );
    tracing::info!(
        lock = %config.leader_election.lock_name,
        namespace = config.cache.namespace().as_deref().unwrap_or("<all>"),
        metrics_enabled = config.metrics.enabled,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );

    // Install the recorder before anything records
    metrics::recorder_handle();

    let shutdown = Shutdown::new();
    let _signals = signals::install(shutdown.clone()).map_err(|e| {
        tracing::error!(error = %e, "Failed to install signal handlers");
        e
    })?;

    let bootstrap = Bootstrap::builder(
        config,
        Arc::new(MemoryLeaseStore::new()),
        Arc::new(MemorySource::new()),
    )
    .scheme_groups(default_groups())
    .controllers(default_controllers())
    .shutdown(shutdown)
    .build()?;

    bootstrap.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
