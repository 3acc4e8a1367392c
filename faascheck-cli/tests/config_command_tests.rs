//! Integration tests for `faascheck config` command.
//!
//! Tests config validation and display functionality with real TOML files.

use std::fs;

use faascheck_cli::cli::{ConfigAction, ConfigArgs, OutputFormat};
use faascheck_cli::commands;
use faascheck_cli::output::OutputWriter;
use tempfile::TempDir;

fn validate_args() -> ConfigArgs {
    ConfigArgs {
        action: ConfigAction::Validate,
    }
}

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("faascheck.toml");

    let valid_config = r#"
[general]
log_level = "debug"
log_format = "json"

[target]
base_url = "http://localhost:8000"
backends = ["docker"]

[poller]
build_timeout_secs = 30
interval_ms = 500

[load]
total_requests = 50
concurrency = 5
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Validating the config
    let writer = OutputWriter::new(OutputFormat::Json);
    let result = commands::config::execute(validate_args(), Some(config_path.as_path()), &writer).await;

    // Then: Should succeed
    assert!(result.is_ok(), "valid config should validate: {result:?}");
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    // Given: A malformed TOML file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[target\nbase_url = 1\n").expect("should write bad config");

    // When: Validating the config
    let writer = OutputWriter::new(OutputFormat::Json);
    let err = commands::config::execute(validate_args(), Some(config_path.as_path()), &writer)
        .await
        .expect_err("malformed TOML should be rejected");

    // Then: Configuration exit code
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_config_validate_invalid_value() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("zero.toml");

    fs::write(&config_path, "[load]\nconcurrency = 0\n").expect("should write config");

    let writer = OutputWriter::new(OutputFormat::Json);
    let err = commands::config::execute(validate_args(), Some(config_path.as_path()), &writer)
        .await
        .expect_err("zero concurrency should be rejected");
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let config_path = std::path::PathBuf::from("/nonexistent/faascheck.toml");

    let writer = OutputWriter::new(OutputFormat::Json);
    let result = commands::config::execute(validate_args(), Some(config_path.as_path()), &writer).await;

    assert!(result.is_err(), "missing file should fail validation");
}

#[tokio::test]
async fn test_config_show_unknown_section() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("faascheck.toml");
    fs::write(&config_path, "").expect("should write empty config");

    let writer = OutputWriter::new(OutputFormat::Text);
    let args = ConfigArgs {
        action: ConfigAction::Show {
            section: Some("ebpf".to_owned()),
        },
    };
    let err = commands::config::execute(args, Some(config_path.as_path()), &writer)
        .await
        .expect_err("unknown section should be rejected");
    assert!(err.to_string().contains("ebpf"));
}

#[tokio::test]
async fn test_config_show_empty_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty config");

    let writer = OutputWriter::new(OutputFormat::Text);
    let args = ConfigArgs {
        action: ConfigAction::Show {
            section: Some("poller".to_owned()),
        },
    };
    let result = commands::config::execute(args, Some(config_path.as_path()), &writer).await;
    assert!(result.is_ok(), "empty file falls back to defaults: {result:?}");
}
