//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - sqlsession.toml (default configuration)
//! - sqlsession.local.toml (git-ignored local overrides)
//! - Environment variables (SQLSESSION_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # sqlsession.toml
//! [session]
//! local_cache_scope = "statement"
//! default_executor = "batch"
//! environment = "production"
//!
//! [cache]
//! max_entries = 4096
//! ttl_secs = 600
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SQLSESSION_SESSION__LOCAL_CACHE_SCOPE=unit_of_work
//! SQLSESSION_CACHE__TTL_SECS=0
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: SharedCacheConfig,
}

/// Per-session executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of the local result cache
    #[serde(default)]
    pub local_cache_scope: CacheScope,

    /// Execution strategy used when a caller does not choose one
    #[serde(default)]
    pub default_executor: ExecutorKind,

    /// Environment id folded into every cache key (None = not folded)
    #[serde(default)]
    pub environment: Option<String>,

    /// Statement timeout in milliseconds applied to new statements. 0 = no timeout.
    #[serde(default)]
    pub default_statement_timeout_ms: u64,

    /// Wrap executors with the shared (second-level) cache decorator
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

/// Shared (cross-session) cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedCacheConfig {
    /// Maximum entries per shared cache before LRU eviction
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entry time-to-live in seconds. 0 = entries never expire.
    #[serde(default)]
    pub ttl_secs: u64,
}

/// Lifetime of the local result cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Results persist until the next write, commit, rollback or close
    #[default]
    #[serde(alias = "session")]
    UnitOfWork,

    /// Results are cleared whenever the outermost statement completes
    Statement,
}

/// Execution strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Execute every statement immediately
    #[default]
    Simple,

    /// Queue writes and send them in batches on flush
    Batch,
}

impl SessionConfig {
    /// Default statement timeout, if any
    pub fn default_statement_timeout(&self) -> Option<Duration> {
        (self.default_statement_timeout_ms > 0)
            .then(|| Duration::from_millis(self.default_statement_timeout_ms))
    }
}

impl SharedCacheConfig {
    /// Entry time-to-live, if any
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_max_entries() -> usize {
    1024
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. sqlsession.toml (base configuration)
    /// 2. sqlsession.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (SQLSESSION_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("sqlsession.toml"))
            .merge(Toml::file("sqlsession.local.toml"))
            .merge(Env::prefixed("SQLSESSION_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SQLSESSION_").split("__"))
            .extract()
    }

    /// Parse configuration from a TOML string (no environment overrides)
    pub fn from_toml_str(source: &str) -> Result<Self, figment::Error> {
        Figment::new().merge(Toml::string(source)).extract()
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            local_cache_scope: CacheScope::UnitOfWork,
            default_executor: ExecutorKind::Simple,
            environment: None,
            default_statement_timeout_ms: 0,
            cache_enabled: default_true(),
        }
    }
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        SharedCacheConfig {
            max_entries: default_max_entries(),
            ttl_secs: 0,
        }
    }
}
