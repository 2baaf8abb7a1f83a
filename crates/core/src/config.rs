//! Environment-driven configuration.
//!
//! Every recognized variable maps onto one field; defaults match the
//! documented tuning values. `Config::from_env()` is the only entry point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Dispatcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
  /// Disable plugin loading entirely; BM25-only dispatch
  pub use_simple_dispatcher: bool,
  /// Seconds before abandoning a plugin load
  pub plugin_load_timeout_secs: u64,
  /// Outer timeout for a search operation
  pub search_timeout_secs: u64,
  /// Outer timeout for a multi-repo search
  pub multi_repo_timeout_secs: u64,
  /// Inner timeout for the local fallback after a multi-repo failure
  pub multi_repo_fallback_timeout_secs: u64,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      use_simple_dispatcher: false,
      plugin_load_timeout_secs: 5,
      search_timeout_secs: 10,
      multi_repo_timeout_secs: 10,
      multi_repo_fallback_timeout_secs: 5,
    }
  }
}

impl DispatcherConfig {
  pub fn plugin_load_timeout(&self) -> Duration {
    Duration::from_secs(self.plugin_load_timeout_secs)
  }

  pub fn search_timeout(&self) -> Duration {
    Duration::from_secs(self.search_timeout_secs)
  }
}

/// Cache tuning (L1 bounds; Redis presence enables L2)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub max_entries: usize,
  pub max_bytes: u64,
  pub default_ttl_secs: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub redis_url: Option<String>,
  /// L3 cache directory; defaults to `<data_dir>/cache`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub disk_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_entries: 1000,
      max_bytes: 100 * 1024 * 1024,
      default_ttl_secs: 3600,
      redis_url: None,
      disk_dir: None,
    }
  }
}

impl CacheConfig {
  pub fn default_ttl(&self) -> Duration {
    Duration::from_secs(self.default_ttl_secs)
  }
}

/// Distributed coordinator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
  pub batch_size: usize,
  pub max_workers: usize,
  pub health_check_interval_secs: u64,
  pub heartbeat_interval_secs: u64,
  pub result_ttl_secs: u64,
  pub max_retries: u32,
  pub job_timeout_secs: u64,
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    Self {
      batch_size: 100,
      max_workers: 10,
      health_check_interval_secs: 10,
      heartbeat_interval_secs: 5,
      result_ttl_secs: 3600,
      max_retries: 3,
      job_timeout_secs: 300,
    }
  }
}

/// Index discovery and multi-repo authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Base data directory; per-repo databases live in `<data_dir>/indexes`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data_dir: Option<PathBuf>,
  /// Search additional standard directories for an index
  pub multi_path_discovery: bool,
  /// Extra index search directories
  pub index_paths: Vec<PathBuf>,
  /// Allow-list of external repository identifiers
  pub authorized_reference_repos: Vec<String>,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      data_dir: None,
      multi_path_discovery: true,
      index_paths: Vec::new(),
      authorized_reference_repos: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
  pub dispatcher: DispatcherConfig,
  pub cache: CacheConfig,
  pub coordinator: CoordinatorConfig,
  pub index: IndexConfig,
  /// Include elapsed-ms fields in responses
  pub debug: bool,
}

impl Config {
  /// Build the configuration from the process environment
  pub fn from_env() -> Self {
    let redis_url = env_string("REDIS_URL");

    Self {
      dispatcher: DispatcherConfig {
        use_simple_dispatcher: env_flag("USE_SIMPLE_DISPATCHER", false),
        plugin_load_timeout_secs: env_parse("PLUGIN_LOAD_TIMEOUT", 5),
        ..DispatcherConfig::default()
      },
      cache: CacheConfig {
        max_entries: env_parse("CACHE_MAX_ENTRIES", 1000),
        max_bytes: env_parse::<u64>("CACHE_MAX_MB", 100) * 1024 * 1024,
        default_ttl_secs: env_parse("CACHE_DEFAULT_TTL", 3600),
        redis_url: redis_url.clone(),
        disk_dir: None,
      },
      coordinator: CoordinatorConfig {
        batch_size: env_parse("BATCH_SIZE", 100),
        max_workers: env_parse("MAX_WORKERS", 10),
        health_check_interval_secs: env_parse("HEALTH_CHECK_INTERVAL", 10),
        heartbeat_interval_secs: env_parse("HEARTBEAT_INTERVAL", 5),
        result_ttl_secs: env_parse("RESULT_TTL", 3600),
        ..CoordinatorConfig::default()
      },
      index: IndexConfig {
        data_dir: env_string("CODESCOPE_DATA_DIR").map(PathBuf::from),
        multi_path_discovery: env_flag("MULTI_PATH_DISCOVERY", true),
        index_paths: env_string("INDEX_PATHS")
          .map(|v| std::env::split_paths(&v).collect())
          .unwrap_or_default(),
        authorized_reference_repos: env_string("AUTHORIZED_REFERENCE_REPOS")
          .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
          .unwrap_or_default(),
      },
      debug: env_flag("CODESCOPE_DEBUG", false),
    }
  }

  /// Resolved base data directory
  pub fn data_dir(&self) -> PathBuf {
    self
      .index
      .data_dir
      .clone()
      .unwrap_or_else(|| default_data_dir())
  }
}

/// Default data directory: `~/.local/share/codescope` (platform equivalent)
pub fn default_data_dir() -> PathBuf {
  dirs::data_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("codescope")
}

fn env_string(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str, default: bool) -> bool {
  match std::env::var(name) {
    Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    Err(_) => default,
  }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
  std::env::var(name)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert!(!config.dispatcher.use_simple_dispatcher);
    assert_eq!(config.dispatcher.plugin_load_timeout_secs, 5);
    assert_eq!(config.dispatcher.search_timeout_secs, 10);
    assert_eq!(config.cache.max_entries, 1000);
    assert_eq!(config.cache.max_bytes, 100 * 1024 * 1024);
    assert_eq!(config.coordinator.batch_size, 100);
    assert_eq!(config.coordinator.heartbeat_interval_secs, 5);
    assert_eq!(config.coordinator.result_ttl_secs, 3600);
  }

  #[test]
  fn test_multi_path_discovery_defaults_on() {
    let config = Config::default();
    assert!(config.index.multi_path_discovery);
  }

  #[test]
  fn test_env_parse_fallback() {
    assert_eq!(env_parse("CODESCOPE_TEST_MISSING_VAR", 42u64), 42);
  }
}
