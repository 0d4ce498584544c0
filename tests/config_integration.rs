//! Integration tests for configuration loading.
//!
//! These tests verify that `stratum.toml` files on disk load into the
//! settings the reconciler consumes.

use std::io::Write;

use stratum::migrate::config::CONFIG_FILE_NAME;
use stratum::migrate::logging;
use stratum::migrate::{StratumConfig, TargetVersion, ValidatePattern};

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    let mut file = std::fs::File::create(&path).expect("create config");
    file.write_all(content.as_bytes()).expect("write config");
    path
}

/// Test loading a full configuration file
#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
        [migrations]
        target = "current"
        out_of_order = true
        ignore_migration_patterns = ["*:missing"]
        one_shot_prefix = "O"

        [logging]
        level = "info"
        format = "compact"
        "#,
    );

    let config = StratumConfig::from_file(&path).expect("load config");
    assert_eq!(config.migrations.target, TargetVersion::Current);
    assert!(config.migrations.out_of_order);
    assert!(config.migrations.republish_on_change);
    assert_eq!(
        config.migrations.ignore_migration_patterns,
        vec![ValidatePattern::parse("*:missing").expect("pattern")]
    );
    assert_eq!(config.logging.format.as_deref(), Some("compact"));
}

/// Test that a missing file is an error for `from_file`
#[test]
fn test_config_from_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = StratumConfig::from_file(dir.path().join("absent.toml"));
    assert!(result.is_err());
}

/// Test that `load` falls back to defaults when the file is absent
#[tokio::test]
async fn test_config_load_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = StratumConfig::load(dir.path().join(CONFIG_FILE_NAME))
        .await
        .expect("defaults");
    assert_eq!(config.migrations.target, TargetVersion::Latest);
    assert!(config.migrations.republish_on_change);
    assert!(config.migrations.one_shot_prefix.is_none());
}

/// Test environment overrides after loading from disk
#[tokio::test]
async fn test_config_load_with_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
        [migrations]
        target = "latest"

        [environments.staging.migrations]
        target = "4.2"
        republish_on_change = false
        "#,
    );

    let config = StratumConfig::load(&path)
        .await
        .expect("load")
        .with_environment("staging")
        .expect("staging");
    assert_eq!(config.migrations.target.to_string(), "4.2");
    assert!(!config.migrations.republish_on_change);
}

/// Test that an override cannot switch off purging with an empty prefix
#[tokio::test]
async fn test_config_load_rejects_empty_prefix_override() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
        [environments.ci.migrations]
        one_shot_prefix = ""
        "#,
    );

    let config = StratumConfig::load(&path).await.expect("load");
    assert!(config.with_environment("ci").is_err());
}

/// Test that a malformed file reports an error
#[tokio::test]
async fn test_config_load_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(&dir, "[migrations]\ntarget = \n");
    assert!(StratumConfig::load(&path).await.is_err());
}

/// Test that logging settings from a file feed the logging setup
#[test]
fn test_logging_from_config() {
    let config: StratumConfig = "[logging]\nlevel = \"debug\"\nformat = \"compact\"\n"
        .parse()
        .expect("config");

    if std::env::var("STRATUM_LOG_FORMAT").is_err() {
        assert_eq!(logging::get_log_format(&config.logging), "compact");
    }
    if std::env::var("STRATUM_LOG_LEVEL").is_err() {
        assert_eq!(logging::get_log_level(&config.logging), "debug");
    }

    // Repeated initialization is a no-op.
    logging::init_with_config(&config.logging);
    logging::init_with_config(&config.logging);
}
