//! Environment variable and config file support for [`RuntimeBuilder`](super::builder::RuntimeBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`max_threads(4)`)
//! 2. **Environment variables**: values from `EXPECTANT_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`RuntimeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `EXPECTANT_POOL_MIN_THREADS` | `usize` | `min_threads` |
//! | `EXPECTANT_POOL_MAX_THREADS` | `usize` | `max_threads` |
//! | `EXPECTANT_POOL_IDLE_TIMEOUT_MS` | `u64` | `idle_timeout` |
//! | `EXPECTANT_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |
//! | `EXPECTANT_NAMED_CONTEXTS` | comma-separated list | `named_contexts` |

use super::builder::ConfigError;
use crate::runtime::config::RuntimeConfig;
use crate::types::ContextId;
use std::time::Duration;

/// Environment variable name for the minimum pool size.
pub const ENV_POOL_MIN_THREADS: &str = "EXPECTANT_POOL_MIN_THREADS";
/// Environment variable name for the maximum pool size.
pub const ENV_POOL_MAX_THREADS: &str = "EXPECTANT_POOL_MAX_THREADS";
/// Environment variable name for the idle worker timeout in milliseconds.
pub const ENV_POOL_IDLE_TIMEOUT_MS: &str = "EXPECTANT_POOL_IDLE_TIMEOUT_MS";
/// Environment variable name for the thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "EXPECTANT_THREAD_NAME_PREFIX";
/// Environment variable name for eagerly started named contexts.
pub const ENV_NAMED_CONTEXTS: &str = "EXPECTANT_NAMED_CONTEXTS";

/// Apply environment variable overrides to a [`RuntimeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_POOL_MIN_THREADS) {
        config.min_threads = parse_usize(ENV_POOL_MIN_THREADS, &val)?;
    }
    if let Some(val) = read_env(ENV_POOL_MAX_THREADS) {
        config.max_threads = parse_usize(ENV_POOL_MAX_THREADS, &val)?;
    }
    if let Some(val) = read_env(ENV_POOL_IDLE_TIMEOUT_MS) {
        config.idle_timeout = Duration::from_millis(parse_u64(ENV_POOL_IDLE_TIMEOUT_MS, &val)?);
    }
    if let Some(val) = read_env(ENV_THREAD_NAME_PREFIX) {
        config.thread_name_prefix = val;
    }
    if let Some(val) = read_env(ENV_NAMED_CONTEXTS) {
        config.named_contexts = parse_context_list(&val);
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidEnv {
            var,
            value: val.to_string(),
            reason: format!("expected unsigned integer ({e})"),
        })
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnv {
            var,
            value: val.to_string(),
            reason: format!("expected milliseconds as u64 ({e})"),
        })
}

/// Splits `a, b,,c` into `[a, b, c]`; blank entries are ignored.
fn parse_context_list(val: &str) -> Vec<ContextId> {
    val.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ContextId::new)
        .collect()
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable runtime configuration.
///
/// ```toml
/// [pool]
/// min_threads = 1
/// max_threads = 8
/// idle_timeout_ms = 10000
/// thread_name_prefix = "myapp"
///
/// [contexts]
/// named = ["coordinator", "render"]
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct RuntimeTomlConfig {
    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolToml,
    /// Named context settings.
    #[serde(default)]
    pub contexts: ContextsToml,
}

/// Pool section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct PoolToml {
    /// Minimum number of workers.
    pub min_threads: Option<usize>,
    /// Maximum number of workers.
    pub max_threads: Option<usize>,
    /// Idle timeout in milliseconds.
    pub idle_timeout_ms: Option<u64>,
    /// Thread name prefix.
    pub thread_name_prefix: Option<String>,
}

/// Contexts section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct ContextsToml {
    /// Contexts started eagerly.
    pub named: Option<Vec<String>>,
}

/// Apply a parsed TOML config to a [`RuntimeConfig`].
///
/// Only fields that are present in the file override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut RuntimeConfig, toml: &RuntimeTomlConfig) {
    if let Some(v) = toml.pool.min_threads {
        config.min_threads = v;
    }
    if let Some(v) = toml.pool.max_threads {
        config.max_threads = v;
    }
    if let Some(v) = toml.pool.idle_timeout_ms {
        config.idle_timeout = Duration::from_millis(v);
    }
    if let Some(ref v) = toml.pool.thread_name_prefix {
        config.thread_name_prefix.clone_from(v);
    }
    if let Some(ref names) = toml.contexts.named {
        config.named_contexts = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(ContextId::new)
            .collect();
    }
}

/// Parse a TOML string into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<RuntimeTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(ConfigError::Toml)
}

/// Read and parse a TOML file into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<RuntimeTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
