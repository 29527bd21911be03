// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and validation.

use parley_config::diagnostic::{ConfigError, suggest_key};
use parley_config::model::Environment;
use parley_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};
use serial_test::serial;

#[test]
fn full_document_deserializes() {
    let toml = r#"
[server]
host = "127.0.0.1"
port = 9090
environment = "production"
log_level = "debug"

[storage]
database_path = "/tmp/parley-test.db"
wal_mode = false
busy_timeout_ms = 100

[events]
enabled = true
redis_url = "redis://cache:6379/2"
source = "parley-test"
queue_capacity = 16
emit_timeout_ms = 250
connect_timeout_ms = 500

[auth]
bearer_token = "t0ken"

[cors]
allowed_origins = ["https://app.example.com"]
"#;

    let config = load_and_validate_str(toml).expect("document should be valid");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.environment, Environment::Production);
    assert_eq!(config.storage.database_path, "/tmp/parley-test.db");
    assert!(!config.storage.wal_mode);
    assert!(config.events.enabled);
    assert_eq!(config.events.redis_url, "redis://cache:6379/2");
    assert_eq!(config.events.queue_capacity, 16);
    assert_eq!(config.auth.bearer_token.as_deref(), Some("t0ken"));
    assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
}

#[test]
fn empty_document_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is fine");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.environment, Environment::Development);
    assert_eq!(config.storage.database_path, "./data/parley.db");
    assert!(config.storage.wal_mode);
    assert!(!config.events.enabled);
    assert_eq!(config.events.source, "parley");
    assert_eq!(config.events.emit_timeout_ms, 3000);
    assert!(config.auth.bearer_token.is_none());
    assert_eq!(config.cors.allowed_origins, vec!["*"]);
}

#[test]
fn unknown_key_is_rejected_with_suggestion() {
    let toml = r#"
[events]
redis_ulr = "redis://localhost"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let found = errors.iter().any(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => key == "redis_ulr" && suggestion.as_deref() == Some("redis_url"),
        _ => false,
    });
    assert!(found, "expected an UnknownKey with a suggestion: {errors:?}");
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn production_without_token_fails_validation() {
    let toml = r#"
[server]
environment = "production"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn suggest_key_matches_section_names() {
    let sections = &["server", "storage", "events", "auth", "cors"];
    assert_eq!(suggest_key("evnets", sections), Some("events".to_string()));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parley.toml");
    std::fs::write(&path, "[server]\nport = 7000\n").unwrap();

    // SAFETY: serialized with every other env-touching test.
    unsafe {
        std::env::set_var("PARLEY_SERVER_PORT", "7100");
        std::env::set_var("PARLEY_STORAGE_DATABASE_PATH", "/tmp/from-env.db");
    }
    let loaded = load_config_from_path(&path);
    unsafe {
        std::env::remove_var("PARLEY_SERVER_PORT");
        std::env::remove_var("PARLEY_STORAGE_DATABASE_PATH");
    }

    let config = loaded.expect("config should load");
    assert_eq!(config.server.port, 7100);
    assert_eq!(config.storage.database_path, "/tmp/from-env.db");
}

#[test]
#[serial]
fn file_values_apply_without_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parley.toml");
    std::fs::write(&path, "[events]\nqueue_capacity = 8\n").unwrap();

    let config = load_and_validate_path(&path).expect("config should load");
    assert_eq!(config.events.queue_capacity, 8);
}

#[test]
#[serial]
fn env_overrides_pass_startup_validation() {
    // SAFETY: serialized with every other env-touching test.
    unsafe {
        std::env::set_var("PARLEY_EVENTS_ENABLED", "false");
        std::env::set_var("PARLEY_SERVER_LOG_LEVEL", "debug");
        std::env::set_var("PARLEY_AUTH_BEARER_TOKEN", "s3cret");
    }
    let loaded = parley_config::load_and_validate();
    unsafe {
        std::env::remove_var("PARLEY_EVENTS_ENABLED");
        std::env::remove_var("PARLEY_SERVER_LOG_LEVEL");
        std::env::remove_var("PARLEY_AUTH_BEARER_TOKEN");
    }

    let config = match loaded {
        Ok(config) => config,
        Err(errors) => panic!(
            "env overrides should load: {:?}",
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>()
        ),
    };
    assert!(!config.events.enabled);
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.auth.bearer_token.as_deref(), Some("s3cret"));
}
