// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pagesync.toml` > `~/.config/pagesync/pagesync.toml`
//! > `/etc/pagesync/pagesync.toml` with environment variable overrides via the
//! `PAGESYNC_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PagesyncConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pagesync/pagesync.toml` (system-wide)
/// 3. `~/.config/pagesync/pagesync.toml` (user XDG config)
/// 4. `./pagesync.toml` (local directory)
/// 5. `PAGESYNC_*` environment variables
pub fn load_config() -> Result<PagesyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PagesyncConfig::default()))
        .merge(Toml::file("/etc/pagesync/pagesync.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pagesync/pagesync.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pagesync.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and for callers that supply config contents directly.
pub fn load_config_from_str(toml_content: &str) -> Result<PagesyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PagesyncConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PagesyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PagesyncConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PAGESYNC_STORAGE_DATABASE_PATH` must
/// map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("PAGESYNC_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: PAGESYNC_GRAPH_BASE_URL -> "graph_base_url"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("graph_", "graph.", 1)
            .replacen("webhook_", "webhook.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("cache_", "cache.", 1);
        mapped.into()
    })
}
