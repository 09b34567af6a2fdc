//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! layering environment overrides on top.

use std::io::Write;
use std::sync::Mutex;

use barsync_domain::{ApiMode, BarSyncConfig, BarSyncError};
use barsync_infra::config;
use once_cell::sync::Lazy;
use tempfile::{Builder, NamedTempFile};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("temp file created");
    file.write_all(contents.as_bytes()).expect("config written");
    file
}

#[test]
fn test_load_config_from_toml_file() {
    let file = config_file(
        ".toml",
        r#"
        [database]
        path = "/var/lib/barsync/queue.db"
        pool_size = 2

        [api]
        mode = "mock"
        mock_failure_rate = 0.0

        [sync]
        interval_seconds = 15
        recently_synced_window_ms = 8000

        [business_day]
        closing_hour = 4
        timezone = "Africa/Dakar"
        "#,
    );

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();

    assert_eq!(config.database.path, "/var/lib/barsync/queue.db");
    assert_eq!(config.database.pool_size, 2);
    assert_eq!(config.api.mode, ApiMode::Mock);
    assert_eq!(config.sync.interval_seconds, 15);
    assert_eq!(config.sync.recently_synced_window_ms, 8000);
    assert_eq!(config.business_day.closing_hour, 4);
    assert_eq!(config.business_day.timezone, "Africa/Dakar");
    // Untouched keys keep their defaults
    assert_eq!(config.sync.max_retries, BarSyncConfig::default().sync.max_retries);
    assert_eq!(config.logging, BarSyncConfig::default().logging);
}

#[test]
fn test_load_config_from_json_file() {
    let file = config_file(
        ".json",
        r#"{
            "api": { "mode": "live", "base_url": "https://bar.example.supabase.co" },
            "sync": { "enabled": false }
        }"#,
    );

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(config.api.mode, ApiMode::Live);
    assert_eq!(config.api.base_url, "https://bar.example.supabase.co");
    assert!(!config.sync.enabled);
}

#[test]
fn test_env_overrides_file_values() {
    let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
    let file = config_file(
        ".toml",
        r#"
        [api]
        mode = "live"
        base_url = "https://bar.example.supabase.co"
        [business_day]
        closing_hour = 4
        "#,
    );

    std::env::set_var("BARSYNC_CLOSING_HOUR", "7");
    std::env::set_var("BARSYNC_API_KEY", "anon-key");
    let result = config::load_with(Some(file.path().to_path_buf()));
    std::env::remove_var("BARSYNC_CLOSING_HOUR");
    std::env::remove_var("BARSYNC_API_KEY");

    let config = result.unwrap();
    assert_eq!(config.business_day.closing_hour, 7);
    assert_eq!(config.api.api_key.as_deref(), Some("anon-key"));
    assert_eq!(config.api.base_url, "https://bar.example.supabase.co");
}

#[test]
fn test_invalid_values_fail_validation_with_every_field() {
    let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
    let file = config_file(
        ".toml",
        r#"
        [api]
        mode = "mock"
        mock_failure_rate = 1.5
        [business_day]
        closing_hour = 25
        timezone = "Mars/Olympus"
        "#,
    );

    let err = config::load_with(Some(file.path().to_path_buf())).unwrap_err();
    let BarSyncError::Config(message) = err else {
        panic!("expected a config error, got {err:?}");
    };
    assert!(message.contains("mock_failure_rate"), "{message}");
    assert!(message.contains("closing_hour"), "{message}");
    assert!(message.contains("timezone"), "{message}");
}

#[test]
fn test_malformed_and_missing_files() {
    let file = config_file(".toml", "[sync\ninterval_seconds = ");
    assert!(matches!(
        config::load_from_file(Some(file.path().to_path_buf())),
        Err(BarSyncError::Config(_))
    ));

    let missing = std::env::temp_dir().join("barsync-definitely-missing.toml");
    assert!(matches!(config::load_with(Some(missing)), Err(BarSyncError::Config(_))));
}
