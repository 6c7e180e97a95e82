//! Process-wide configuration, loaded entirely from environment variables.
//!
//! There is no config file format here: the upstream capture daemon is the only
//! external dependency and it is addressed by a single base URL, so a bootstrap-file
//! layer (as LunaRoute uses for its multi-source config) would be pure overhead.

use std::time::Duration;

/// Runtime configuration for the indexing core and its server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream HTTP capture daemon.
    pub base_url: String,

    /// Maximum number of full entry records held in the entry cache.
    pub entry_cache_max_items: usize,

    /// Whether body content is tokenized and indexed.
    pub index_body: bool,

    /// Maximum number of body bytes considered during body tokenization.
    pub index_body_max_bytes: usize,

    /// How long a session's index may go unrefreshed before a tool call blocks on it.
    pub freshness_threshold: Duration,

    /// Interval between background refresh ticks.
    pub refresh_interval: Duration,

    /// Per-refresh timeout.
    pub refresh_timeout: Duration,

    /// Number of entries fetched on a rebuild (strategy detection).
    pub bootstrap_tail_limit: usize,

    /// Bounded worker count for concurrent entry fetches during a refresh.
    pub fetch_workers: usize,

    /// Cap on body bytes materialized for tool responses.
    pub resource_max_body_bytes: usize,

    /// `tracing` env-filter directive.
    pub log_level: String,

    /// Optional path to a log file; logs go to stderr when unset.
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7777".to_string(),
            entry_cache_max_items: 10_000,
            index_body: true,
            index_body_max_bytes: 65_536,
            freshness_threshold: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(20),
            bootstrap_tail_limit: 500,
            fetch_workers: 8,
            resource_max_body_bytes: 1_048_576,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to the
    /// defaults documented in the module-level env var list.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("POWHTTP_BASE_URL", defaults.base_url),
            entry_cache_max_items: env_parsed(
                "ENTRY_CACHE_MAX_ITEMS",
                defaults.entry_cache_max_items,
            ),
            index_body: env_bool("INDEX_BODY", defaults.index_body),
            index_body_max_bytes: env_parsed(
                "INDEX_BODY_MAX_BYTES",
                defaults.index_body_max_bytes,
            ),
            freshness_threshold: env_secs("FRESHNESS_THRESHOLD", defaults.freshness_threshold),
            refresh_interval: env_secs("REFRESH_INTERVAL", defaults.refresh_interval),
            refresh_timeout: env_secs("REFRESH_TIMEOUT", defaults.refresh_timeout),
            bootstrap_tail_limit: env_parsed(
                "BOOTSTRAP_TAIL_LIMIT",
                defaults.bootstrap_tail_limit,
            ),
            fetch_workers: env_parsed("FETCH_WORKERS", defaults.fetch_workers),
            resource_max_body_bytes: env_parsed(
                "RESOURCE_MAX_BODY_BYTES",
                defaults.resource_max_body_bytes,
            ),
            log_level: env_string("LOG_LEVEL", defaults.log_level),
            log_file: std::env::var("LOG_FILE").ok(),
        }
    }
}

fn env_string(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parsed(name, default.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.base_url, "http://localhost:7777");
        assert_eq!(c.entry_cache_max_items, 10_000);
        assert!(c.index_body);
        assert_eq!(c.index_body_max_bytes, 65_536);
        assert_eq!(c.freshness_threshold, Duration::from_secs(5));
        assert_eq!(c.refresh_interval, Duration::from_secs(30));
        assert_eq!(c.refresh_timeout, Duration::from_secs(20));
        assert_eq!(c.bootstrap_tail_limit, 500);
        assert_eq!(c.fetch_workers, 8);
        assert_eq!(c.resource_max_body_bytes, 1_048_576);
        assert_eq!(c.log_level, "info");
        assert!(c.log_file.is_none());
    }

    #[test]
    fn env_bool_accepts_common_truthy_values() {
        assert!(env_bool_for_test("true"));
        assert!(env_bool_for_test("1"));
        assert!(env_bool_for_test("yes"));
        assert!(!env_bool_for_test("0"));
        assert!(!env_bool_for_test("false"));
    }

    fn env_bool_for_test(v: &str) -> bool {
        matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    }
}
