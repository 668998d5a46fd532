//! The `manager` binary's handling of bad configuration.

use std::process::Command;

#[test]
fn test_missing_config_is_logged_and_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_manager"))
        .args(["--config", "/nonexistent/manager.toml"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Failed to load configuration"), "stdout: {stdout}");
    assert!(stdout.contains("/nonexistent/manager.toml"), "stdout: {stdout}");
}

#[test]
fn test_invalid_override_is_logged_as_json() {
    let output = Command::new(env!("CARGO_BIN_EXE_manager"))
        .args(["--log-level", "verbose", "--log-format", "json"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|line| line.contains("Failed to load configuration"))
        .unwrap_or_else(|| panic!("stdout: {stdout}"));
    let event: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(event["level"], "ERROR");
    assert!(event["fields"]["error"]
        .as_str()
        .is_some_and(|error| error.contains("verbose")));
}
