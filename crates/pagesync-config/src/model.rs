// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for pagesync.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level pagesync configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PagesyncConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Remote graph API settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Webhook HTTP listener settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Read-through lookup cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

/// Remote graph API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Base URL of the remote graph API.
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,

    /// API version path segment (e.g. "v19.0").
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,

    /// Page access token appended to every call. Token issuance and refresh
    /// happen outside this service.
    #[serde(default)]
    pub access_token: String,

    /// Bounded per-call timeout in seconds.
    #[serde(default = "default_graph_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            api_version: default_graph_api_version(),
            access_token: String::new(),
            timeout_secs: default_graph_timeout_secs(),
        }
    }
}

/// Webhook HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Host address to bind.
    #[serde(default = "default_webhook_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_webhook_port")]
    pub port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_webhook_host(),
            port: default_webhook_port(),
        }
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Read-through lookup cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether the cache backs store lookups at all. The store is always
    /// the system of record; disabling this only removes the fast path.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of cached lookups.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Per-entry time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_service_name() -> String {
    "pagesync".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v19.0".to_string()
}

fn default_graph_timeout_secs() -> u64 {
    30
}

fn default_webhook_host() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_port() -> u16 {
    8470
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("pagesync/pagesync.db").display().to_string())
        .unwrap_or_else(|| "pagesync.db".to_string())
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    4096
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = PagesyncConfig::default();
        assert_eq!(config.service.name, "pagesync");
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.graph.api_version, "v19.0");
        assert_eq!(config.graph.timeout_secs, 30);
        assert!(config.cache.enabled);
    }

    #[test]
    fn sections_deserialize_from_toml() {
        let toml_str = r#"
[service]
name = "inbox-sync"
log_level = "debug"

[graph]
base_url = "https://graph.example.test"
timeout_secs = 10

[webhook]
host = "0.0.0.0"
port = 9000
"#;
        let config: PagesyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.name, "inbox-sync");
        assert_eq!(config.graph.base_url, "https://graph.example.test");
        assert_eq!(config.graph.timeout_secs, 10);
        assert_eq!(config.webhook.port, 9000);
        // Untouched sections keep defaults.
        assert_eq!(config.cache.capacity, 4096);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[graph]
base_ur = "https://typo.example.test"
"#;
        assert!(toml::from_str::<PagesyncConfig>(toml_str).is_err());
    }
}
