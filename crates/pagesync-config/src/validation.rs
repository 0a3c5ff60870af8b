// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, non-empty paths, and positive
//! timeouts.

use crate::diagnostic::ConfigError;
use crate::model::PagesyncConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PagesyncConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Validate webhook.host is not empty and looks like an IP or hostname
    let host = config.webhook.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "webhook.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("webhook.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    // Validate database_path is not empty
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // Validate graph.base_url parses as an absolute http(s) URL prefix
    let base = config.graph.base_url.trim();
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        errors.push(ConfigError::Validation {
            message: format!("graph.base_url `{base}` must start with http:// or https://"),
        });
    }

    // Remote calls must carry a bounded, non-zero timeout
    if config.graph.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "graph.timeout_secs must be greater than zero".to_string(),
        });
    }

    if config.cache.enabled && config.cache.capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "cache.capacity must be greater than zero when cache.enabled".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = PagesyncConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = PagesyncConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let mut config = PagesyncConfig::default();
        config.graph.timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("timeout_secs"))));
    }

    #[test]
    fn non_http_base_url_fails_validation() {
        let mut config = PagesyncConfig::default();
        config.graph.base_url = "ftp://graph.example.test".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_capacity_allowed_when_cache_disabled() {
        let mut config = PagesyncConfig::default();
        config.cache.enabled = false;
        config.cache.capacity = 0;
        assert!(validate_config(&config).is_ok());
    }
}
