//! Configuration resolution tests
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate EFQ_* variables are marked with #[serial].

use std::path::Path;

use efq_common::config::{
    resolve_config_path, resolve_secret, ConfigSource, TomlConfig, CONFIG_ENV_VAR,
};
use serial_test::serial;

const TEST_SECRET_VAR: &str = "EFQ_TEST_SECRET";

// ============================================================================
// Secret resolution
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_toml() {
    std::env::set_var(TEST_SECRET_VAR, "env-key");

    let result = resolve_secret("Test key", TEST_SECRET_VAR, Some("toml-key"));
    assert_eq!(result.as_deref(), Some("env-key"));

    std::env::remove_var(TEST_SECRET_VAR);
}

#[test]
#[serial]
fn test_toml_fallback_when_env_empty() {
    std::env::remove_var(TEST_SECRET_VAR);

    let result = resolve_secret("Test key", TEST_SECRET_VAR, Some("toml-key"));
    assert_eq!(result.as_deref(), Some("toml-key"));
}

#[test]
#[serial]
fn test_blank_values_ignored() {
    std::env::set_var(TEST_SECRET_VAR, "   ");

    assert_eq!(resolve_secret("Test key", TEST_SECRET_VAR, Some("")), None);
    assert_eq!(
        resolve_secret("Test key", TEST_SECRET_VAR, Some("toml-key")).as_deref(),
        Some("toml-key")
    );

    std::env::remove_var(TEST_SECRET_VAR);
}

#[test]
#[serial]
fn test_no_sources_yields_none() {
    std::env::remove_var(TEST_SECRET_VAR);
    assert_eq!(resolve_secret("Test key", TEST_SECRET_VAR, None), None);
}

// ============================================================================
// Config file location and loading
// ============================================================================

#[test]
#[serial]
fn test_cli_path_overrides_env() {
    std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
    assert_eq!(resolved.as_deref(), Some(Path::new("/from/cli.toml")));

    let resolved = resolve_config_path(None);
    assert_eq!(resolved.as_deref(), Some(Path::new("/from/env.toml")));

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_load_or_default_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("efq-mv.toml");
    std::fs::write(
        &path,
        r#"
        port = 5999
        batch_size = 250

        [notification]
        operator_email = "ops@example.org"
        "#,
    )
    .unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config.port, Some(5999));
    assert_eq!(config.batch_size, Some(250));
    assert_eq!(source, ConfigSource::File(path));
}

#[test]
#[serial]
fn test_load_or_default_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let (config, source) = TomlConfig::load_or_default(Some(&path));
    assert!(config.port.is_none());
    assert_eq!(config.logging.level, "info");
    assert!(matches!(source, ConfigSource::Defaults { .. }));
}

#[test]
#[serial]
fn test_load_or_default_broken_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = [").unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path));
    assert!(config.port.is_none());
    match source {
        ConfigSource::Defaults { reason } => assert!(reason.contains("Parse TOML failed")),
        other => panic!("Expected defaults, got {:?}", other),
    }
}
