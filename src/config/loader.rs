//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ManagerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ManagerConfig, ConfigError> {
    let config: ManagerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[leader_election]
identity = "replica-a"

[metrics]
port = 9090

[cache]
namespace = "gcp-project-operator"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.leader_election.identity.as_deref(), Some("replica-a"));
        assert_eq!(config.leader_election.lock_name, "project-operator-lock");
        assert_eq!(config.metrics.port, 9090);
        assert_eq!(config.metrics.host, "0.0.0.0");
        assert_eq!(config.cache.namespace().as_deref(), Some("gcp-project-operator"));
        assert_eq!(config.cache.sync_timeout_ms, 120_000);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/manager.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("metrics = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_error_lists_all() {
        let err = parse_config(
            r#"
[leader_election]
lock_name = ""

[cache]
event_buffer = 0
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_log_format() {
        let config = parse_config("[observability]\nlog_format = \"json\"\n").unwrap();
        assert_eq!(config.observability.log_format, crate::config::LogFormat::Json);
    }
}
