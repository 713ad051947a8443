//! Config loading, TOML parsing, and env var override tests.
//!
//! The env override test is `#[ignore]` (process-wide env conflicts in parallel).
//! Run it with: `cargo test --test config_tests -- --ignored --test-threads=1`

use sqlsession::{CacheScope, Config, Configuration, ExecutorKind};
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("sqlsession.toml");
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

// Default Configuration Tests
#[test]
fn test_config_default_cache_scope() {
    let config = Config::default();
    assert_eq!(config.session.local_cache_scope, CacheScope::UnitOfWork);
}

#[test]
fn test_config_default_executor() {
    let config = Config::default();
    assert_eq!(config.session.default_executor, ExecutorKind::Simple);
}

#[test]
fn test_config_default_shared_cache() {
    let config = Config::default();
    assert!(config.session.cache_enabled);
    assert_eq!(config.cache.max_entries, 1024);
    assert_eq!(config.cache.ttl_secs, 0);
}

// File Loading Tests
#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
local_cache_scope = "statement"
default_executor = "batch"
environment = "staging"
default_statement_timeout_ms = 2500
cache_enabled = false

[cache]
max_entries = 64
ttl_secs = 120
"#,
    );

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.session.local_cache_scope, CacheScope::Statement);
    assert_eq!(config.session.default_executor, ExecutorKind::Batch);
    assert_eq!(config.session.environment.as_deref(), Some("staging"));
    assert_eq!(
        config.session.default_statement_timeout(),
        Some(Duration::from_millis(2500))
    );
    assert!(!config.session.cache_enabled);
    assert_eq!(config.cache.max_entries, 64);
    assert_eq!(config.cache.ttl(), Some(Duration::from_secs(120)));
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let config = Config::from_file(&path.to_string_lossy()).unwrap();
    assert_eq!(config.session.local_cache_scope, CacheScope::UnitOfWork);
    assert_eq!(config.cache.max_entries, 1024);
}

#[test]
fn test_config_invalid_scope_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[session]\nlocal_cache_scope = \"forever\"\n");

    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_environment_reaches_configuration() {
    let config = Config::from_toml_str("[session]\nenvironment = \"production\"\n").unwrap();
    let configuration = Configuration::new(config);
    assert_eq!(configuration.environment_id(), Some("production"));
}

#[test]
fn test_config_serializes_to_json() {
    let config = Config::default();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["session"]["local_cache_scope"], "unit_of_work");
    assert_eq!(json["session"]["default_executor"], "simple");
    assert_eq!(json["cache"]["max_entries"], 1024);
}

// Environment Override Tests
#[test]
#[ignore]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[cache]\nttl_secs = 60\n");

    env::set_var("SQLSESSION_CACHE__TTL_SECS", "5");
    env::set_var("SQLSESSION_SESSION__LOCAL_CACHE_SCOPE", "statement");
    let config = Config::from_file(&path);
    env::remove_var("SQLSESSION_CACHE__TTL_SECS");
    env::remove_var("SQLSESSION_SESSION__LOCAL_CACHE_SCOPE");

    let config = config.unwrap();
    assert_eq!(config.cache.ttl_secs, 5);
    assert_eq!(config.session.local_cache_scope, CacheScope::Statement);
}
