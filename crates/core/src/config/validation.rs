//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < 100 {
        return Err(invalid(field, "must be at least 100ms"));
    }
    if value > 300_000 {
        return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` is empty or contains `-` (the bucket name delimiter)
    /// - `cache_prefix` or `user_agent` is empty
    /// - `scope` is not http(s)
    /// - a timeout is less than 100ms or exceeds 5 minutes
    /// - a manifest URL does not resolve against the scope
    ///
    /// Returns `ConfigError::Missing` if the route table is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(invalid("version", "must not be empty"));
        }
        if self.version.contains('-') {
            return Err(invalid("version", "must not contain '-'"));
        }
        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if !matches!(self.scope.scheme(), "http" | "https") {
            return Err(invalid("scope", "must be an http or https URL"));
        }

        check_timeout("network_timeout_ms", self.network_timeout_ms)?;
        check_timeout("fetch_timeout_ms", self.fetch_timeout_ms)?;

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.routes.is_empty() {
            return Err(ConfigError::Missing {
                field: "routes".into(),
                hint: "omit the key to use the built-in table".into(),
            });
        }

        let mut manifest_urls = Vec::with_capacity(self.precache_manifest.len());
        for entry in &self.precache_manifest {
            if entry.url.trim().is_empty() {
                return Err(invalid("precache_manifest", "entry url must not be empty"));
            }
            manifest_urls.push(self.resolve(&entry.url)?);
        }

        let offline = self.offline_document_url()?;
        if !manifest_urls.contains(&offline) {
            tracing::warn!(
                offline_document = %offline,
                "offline document is not in the precache manifest; navigations cannot fall back offline"
            );
        }

        Ok(())
    }
}
